fn main() -> anyhow::Result<()> {
    notetree::cli::run()
}
