use std::fmt::Write as _;
use std::io::{self, Read};

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;

use crate::gateway::{NoteGateway, SearchRequest};
use crate::notes::{format_note_date, Note, NoteId, NoteTree, SaveNote, TreeNode};

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Note identifier
    pub id: NoteId,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Search query terms
    #[arg(required = true)]
    pub query: Vec<String>,
    /// Match titles only
    #[arg(long)]
    pub title: bool,
    /// Match the query as one phrase
    #[arg(long)]
    pub whole: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Title for the note
    pub title: String,
    /// Parent note identifier; omitted creates a root note
    #[arg(long)]
    pub parent: Option<NoteId>,
    /// Provide the note contents inline. If omitted, reads from stdin.
    #[arg(long)]
    pub contents: Option<String>,
}

pub fn print_tree(gateway: &dyn NoteGateway) -> Result<()> {
    let forest = gateway.fetch_tree().context("fetching note tree")?;
    print!("{}", format_outline(&forest));
    Ok(())
}

pub fn show_note(gateway: &dyn NoteGateway, args: ShowArgs) -> Result<()> {
    print!("{}", render_note(gateway, args.id)?);
    Ok(())
}

pub fn search_notes(gateway: &dyn NoteGateway, args: SearchArgs) -> Result<()> {
    let query = args.query.join(" ");
    let query = query.trim();
    if query.is_empty() {
        bail!("search query cannot be empty");
    }
    let request = SearchRequest {
        query: query.to_string(),
        title: args.title,
        whole: args.whole,
    };
    let results = gateway.search(&request).context("executing search")?;
    print!("{}", format_search_results(&results));
    Ok(())
}

pub fn new_note(gateway: &dyn NoteGateway, args: NewArgs) -> Result<()> {
    let title = args.title.trim();
    if title.is_empty() {
        bail!("note title cannot be empty");
    }
    let contents = match args.contents {
        Some(contents) => contents,
        None => read_stdin()?.unwrap_or_default(),
    };
    let saved = gateway
        .create_note(&new_note_request(title, args.parent, contents))
        .context("creating note")?;
    println!("Created note #{}", saved.id);
    Ok(())
}

fn new_note_request(title: &str, parent: Option<NoteId>, contents: String) -> SaveNote {
    SaveNote {
        parent_id: Some(parent.unwrap_or(0)),
        title: Some(title.to_string()),
        contents: Some(contents),
        ..SaveNote::default()
    }
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

fn format_outline(forest: &[TreeNode]) -> String {
    fn walk(node: &TreeNode, depth: usize, out: &mut String) {
        let note = &node.note;
        let marker = match (node.children.is_empty(), note.expanded) {
            (true, _) => "   ",
            (false, true) => "[-]",
            (false, false) => "[+]",
        };
        let star = if note.favorite { " ★" } else { "" };
        let _ = writeln!(
            out,
            "{}{marker} #{} {}{star}",
            "  ".repeat(depth),
            note.id,
            note.title
        );
        for child in &node.children {
            walk(child, depth + 1, out);
        }
    }

    if forest.is_empty() {
        return "No notes.\n".to_string();
    }
    let mut out = String::new();
    for root in forest {
        walk(root, 0, &mut out);
    }
    out
}

fn render_note(gateway: &dyn NoteGateway, id: NoteId) -> Result<String> {
    let tree = NoteTree::from_forest(gateway.fetch_tree().context("fetching note tree")?);
    let note = tree
        .get(id)
        .ok_or_else(|| anyhow!("note #{id} not found"))?;
    let contents = gateway
        .fetch_note(id)
        .with_context(|| format!("loading note #{id}"))?
        .contents
        .ok_or_else(|| anyhow!("contents of note #{id} is not a string"))?;

    let mut path: Vec<&str> = tree.parents(id).into_iter().map(|n| n.title.as_str()).collect();
    path.push(note.title.as_str());
    Ok(format_note(note, &path.join(" / "), &contents))
}

fn format_note(note: &Note, path: &str, contents: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "#{} {}", note.id, path);
    let _ = writeln!(
        out,
        "created {}  modified {}{}",
        format_note_date(note.date_created),
        format_note_date(note.date_modified),
        if note.favorite { "  ★" } else { "" }
    );
    if let Some(url) = note.url.as_deref().filter(|_| note.is_link()) {
        let _ = writeln!(out, "link    {url}");
    }
    out.push('\n');
    out.push_str(contents);
    if !contents.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn format_search_results(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "No matches found.\n".to_string();
    }
    let mut out = String::new();
    for note in notes {
        let _ = writeln!(out, "#{}  {}", note.id, note.title);
    }
    out
}
