use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gateway::NoteGateway;
use crate::journaling::MessageLog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub language: String,
    pub theme: ThemeSettings,
    pub title: TitleSettings,
    pub sidebar: SidebarSettings,
    pub treeview: TreeviewSettings,
    pub double_panel: DoublePanelSettings,
    pub editor: EditorSettings,
    pub viewer: ViewerSettings,
    pub mobile: MobileSettings,
    pub welcome: WelcomeSettings,
    pub search: SearchSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "en".into(),
            theme: ThemeSettings::default(),
            title: TitleSettings::default(),
            sidebar: SidebarSettings::default(),
            treeview: TreeviewSettings::default(),
            double_panel: DoublePanelSettings::default(),
            editor: EditorSettings::default(),
            viewer: ViewerSettings::default(),
            mobile: MobileSettings::default(),
            welcome: WelcomeSettings::default(),
            search: SearchSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeSettings {
    pub default: String,
    pub hljs: String,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            default: "light".into(),
            hljs: "github".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TitleSettings {
    pub path_separator: String,
}

impl Default for TitleSettings {
    fn default() -> Self {
        Self {
            path_separator: " | ".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidebarSettings {
    pub visible: bool,
    pub width: u32,
}

impl Default for SidebarSettings {
    fn default() -> Self {
        Self {
            visible: true,
            width: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeviewSettings {
    pub multiline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoublePanelSettings {
    pub enabled: bool,
    pub vertical: bool,
}

impl Default for DoublePanelSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            vertical: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorSettings {
    pub linewrap: bool,
    pub save_delay: u64,
    pub edit_mode: bool,
    pub autoview: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            linewrap: true,
            save_delay: 500,
            edit_mode: false,
            autoview: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerSettings {
    pub prewrap: bool,
    pub execute_scripts: bool,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            prewrap: false,
            execute_scripts: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MobileSettings {
    pub reverse_interface: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WelcomeSettings {
    pub items_count: usize,
}

impl Default for WelcomeSettings {
    fn default() -> Self {
        Self { items_count: 15 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchSettings {
    pub title: bool,
    pub whole: bool,
    pub search_delay: u64,
    pub tree_mode: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            title: false,
            whole: false,
            search_delay: 500,
            tree_mode: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelMode {
    Off,
    Vertical,
    Horizontal,
}

/// Merges server-provided settings over `defaults` one level deep: a nested
/// object is merged key by key into the default object, any other value
/// replaces the default. Overrides that do not fit the settings shape leave the
/// defaults in place.
pub fn merge_settings(defaults: &Settings, overrides: &Value) -> Settings {
    let Some(overrides) = overrides.as_object() else {
        return defaults.clone();
    };
    let Ok(Value::Object(mut merged)) = serde_json::to_value(defaults) else {
        return defaults.clone();
    };
    for (key, value) in overrides {
        match (merged.get_mut(key), value) {
            (Some(Value::Object(base)), Value::Object(patch)) => {
                for (field, field_value) in patch {
                    base.insert(field.clone(), field_value.clone());
                }
            }
            (_, Value::Null) => {}
            (_, other) => {
                merged.insert(key.clone(), other.clone());
            }
        }
    }
    match serde_json::from_value(Value::Object(merged)) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(%err, "server settings did not match the expected shape; using defaults");
            defaults.clone()
        }
    }
}

/// Remote UI settings with change tracking. Changes made through the setters
/// mark the store dirty; [`SettingsStore::flush`] writes them back.
#[derive(Debug, Default)]
pub struct SettingsStore {
    settings: Settings,
    hljs_themes: Vec<String>,
    loaded: bool,
    dirty: bool,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replaces the settings with `raw` merged over defaults. With `save` unset
    /// the change is not written back.
    pub fn apply(&mut self, raw: &Value, save: bool) {
        let merged = merge_settings(&Settings::default(), raw);
        if merged != self.settings && save {
            self.dirty = true;
        }
        self.settings = merged;
    }

    pub fn load(&mut self, gateway: &dyn NoteGateway, log: &mut MessageLog) {
        match gateway.fetch_settings() {
            Ok(payload) => {
                self.apply(&payload.settings, false);
                self.hljs_themes = payload.hljs_themes;
                self.loaded = true;
                tracing::debug!(themes = self.hljs_themes.len(), "settings loaded");
            }
            Err(err) => log.error(format!("Error loading settings: {err}")),
        }
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Writes pending changes with a full PUT. Failures are logged, not retried.
    pub fn flush(&mut self, gateway: &dyn NoteGateway, log: &mut MessageLog) {
        if !self.take_dirty() {
            return;
        }
        if let Err(err) = gateway.put_settings(&self.settings) {
            log.error(format!("Error saving settings: {err}"));
        }
    }

    fn update(&mut self, change: impl FnOnce(&mut Settings)) {
        let before = self.settings.clone();
        change(&mut self.settings);
        if self.settings != before {
            self.dirty = true;
        }
    }

    pub fn set_theme(&mut self, theme: &str) {
        self.update(|s| s.theme.default = theme.to_string());
    }

    pub fn toggle_theme(&mut self) {
        let next = if self.settings.theme.default == "dark" {
            "light"
        } else {
            "dark"
        };
        self.set_theme(next);
    }

    /// Advances the highlight theme to the next entry of the server's list.
    pub fn next_hljs_theme(&mut self) -> Option<&str> {
        if self.hljs_themes.is_empty() {
            return None;
        }
        let next = self
            .hljs_themes
            .iter()
            .position(|theme| *theme == self.settings.theme.hljs)
            .map_or(0, |index| (index + 1) % self.hljs_themes.len());
        let theme = self.hljs_themes[next].clone();
        self.update(|s| s.theme.hljs = theme);
        Some(self.settings.theme.hljs.as_str())
    }

    pub fn toggle_sidebar(&mut self) {
        self.update(|s| s.sidebar.visible = !s.sidebar.visible);
    }

    pub fn toggle_search_title(&mut self) {
        self.update(|s| s.search.title = !s.search.title);
    }

    pub fn toggle_search_whole(&mut self) {
        self.update(|s| s.search.whole = !s.search.whole);
    }

    pub fn toggle_search_tree_mode(&mut self) {
        self.update(|s| s.search.tree_mode = !s.search.tree_mode);
    }

    pub fn toggle_multiline(&mut self) {
        self.update(|s| s.treeview.multiline = !s.treeview.multiline);
    }

    pub fn panel_mode(&self) -> PanelMode {
        let panel = &self.settings.double_panel;
        match (panel.enabled, panel.vertical) {
            (false, _) => PanelMode::Off,
            (true, true) => PanelMode::Vertical,
            (true, false) => PanelMode::Horizontal,
        }
    }

    pub fn set_panel_mode(&mut self, mode: PanelMode) {
        self.update(|s| {
            let (enabled, vertical) = match mode {
                PanelMode::Off => (false, true),
                PanelMode::Vertical => (true, true),
                PanelMode::Horizontal => (true, false),
            };
            s.double_panel.enabled = enabled;
            s.double_panel.vertical = vertical;
        });
    }

    /// Off, then vertical, then horizontal, then off again.
    pub fn cycle_panel_mode(&mut self) {
        let next = match self.panel_mode() {
            PanelMode::Off => PanelMode::Vertical,
            PanelMode::Vertical => PanelMode::Horizontal,
            PanelMode::Horizontal => PanelMode::Off,
        };
        self.set_panel_mode(next);
    }

    pub fn is_edit_mode(&self) -> bool {
        self.settings.editor.edit_mode
    }

    pub fn set_edit_mode(&mut self, flag: bool) {
        self.update(|s| s.editor.edit_mode = flag);
    }

    pub fn is_auto_view(&self) -> bool {
        self.settings.editor.autoview
    }

    pub fn set_auto_view(&mut self, flag: bool) {
        self.update(|s| s.editor.autoview = flag);
    }

    pub fn toggle_auto_view(&mut self) {
        self.update(|s| s.editor.autoview = !s.editor.autoview);
    }

    pub fn toggle_editor_line_wrap(&mut self) {
        self.update(|s| s.editor.linewrap = !s.editor.linewrap);
    }

    pub fn toggle_viewer_pre_wrap(&mut self) {
        self.update(|s| s.viewer.prewrap = !s.viewer.prewrap);
    }

}

/// Entries of the settings dialog, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, strum::Display)]
pub enum SettingsItem {
    #[strum(to_string = "Theme")]
    Theme,
    #[strum(to_string = "Code highlight theme")]
    HighlightTheme,
    #[strum(to_string = "Sidebar")]
    Sidebar,
    #[strum(to_string = "Multi-line titles")]
    MultilineTitles,
    #[strum(to_string = "Panels")]
    Panels,
    #[strum(to_string = "View on select")]
    AutoView,
    #[strum(to_string = "Editor line wrap")]
    EditorLineWrap,
    #[strum(to_string = "Viewer pre-wrap")]
    ViewerPreWrap,
    #[strum(to_string = "Search titles only")]
    SearchTitle,
    #[strum(to_string = "Search whole words")]
    SearchWhole,
}

impl SettingsItem {
    pub fn value(self, store: &SettingsStore) -> String {
        let settings = store.get();
        let on_off = |flag: bool| if flag { "on" } else { "off" }.to_string();
        match self {
            SettingsItem::Theme => settings.theme.default.clone(),
            SettingsItem::HighlightTheme => settings.theme.hljs.clone(),
            SettingsItem::Sidebar => on_off(settings.sidebar.visible),
            SettingsItem::MultilineTitles => on_off(settings.treeview.multiline),
            SettingsItem::Panels => match store.panel_mode() {
                PanelMode::Off => "single".to_string(),
                PanelMode::Vertical => "side by side".to_string(),
                PanelMode::Horizontal => "stacked".to_string(),
            },
            SettingsItem::AutoView => on_off(settings.editor.autoview),
            SettingsItem::EditorLineWrap => on_off(settings.editor.linewrap),
            SettingsItem::ViewerPreWrap => on_off(settings.viewer.prewrap),
            SettingsItem::SearchTitle => on_off(settings.search.title),
            SettingsItem::SearchWhole => on_off(settings.search.whole),
        }
    }

    /// Flips or advances the item's setting.
    pub fn apply(self, store: &mut SettingsStore) {
        match self {
            SettingsItem::Theme => store.toggle_theme(),
            SettingsItem::HighlightTheme => {
                store.next_hljs_theme();
            }
            SettingsItem::Sidebar => store.toggle_sidebar(),
            SettingsItem::MultilineTitles => store.toggle_multiline(),
            SettingsItem::Panels => store.cycle_panel_mode(),
            SettingsItem::AutoView => store.toggle_auto_view(),
            SettingsItem::EditorLineWrap => store.toggle_editor_line_wrap(),
            SettingsItem::ViewerPreWrap => store.toggle_viewer_pre_wrap(),
            SettingsItem::SearchTitle => store.toggle_search_title(),
            SettingsItem::SearchWhole => store.toggle_search_whole(),
        }
    }

    pub fn affects_search(self) -> bool {
        matches!(self, SettingsItem::SearchTitle | SettingsItem::SearchWhole)
    }
}
