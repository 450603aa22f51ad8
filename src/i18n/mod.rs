//! Internationalization (i18n) module.
//!
//! Provides localized strings for CLI output and category display names.
//! English is the default language; Italian is available as an alternative,
//! since PEC mailboxes are an Italian institution.

use std::sync::OnceLock;

static CURRENT_LANG: OnceLock<Lang> = OnceLock::new();

/// Supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    /// English (default)
    En,
    /// Italian
    It,
}

impl Lang {
    /// Parse a language code string (e.g. "en", "it", "en_US", "it_IT.UTF-8").
    /// Returns `None` for unrecognized codes.
    pub fn from_code(code: &str) -> Option<Self> {
        let normalized = code.to_lowercase();
        let prefix = normalized.split(['_', '-', '.']).next().unwrap_or("");
        match prefix {
            "en" => Some(Self::En),
            "it" => Some(Self::It),
            _ => None,
        }
    }
}

/// Initialize the global language. Call once at startup.
/// If already initialized, this is a no-op.
pub fn set_lang(lang: Lang) {
    let _ = CURRENT_LANG.set(lang);
}

/// Get the currently configured language (defaults to English).
pub fn lang() -> Lang {
    CURRENT_LANG.get().copied().unwrap_or(Lang::En)
}

/// Detect language from `PECBOX_LANG`, then `LC_MESSAGES` / `LANG`.
pub fn detect_system_lang() -> Lang {
    ["PECBOX_LANG", "LC_MESSAGES", "LANG"]
        .iter()
        .find_map(|var| std::env::var(var).ok().and_then(|v| Lang::from_code(&v)))
        .unwrap_or(Lang::En)
}

/// Defines a function returning the string for the current language.
macro_rules! msg {
    ($name:ident, $en:expr, $it:expr) => {
        /// Returns a localized string for the current language.
        pub fn $name() -> &'static str {
            match lang() {
                Lang::En => $en,
                Lang::It => $it,
            }
        }
    };
}

// ── CLI help strings ─────────────────────────────────────────────

msg!(
    app_about,
    "pecbox: fetch a PEC/IMAP mailbox, file every message into a category, save attachments and export a report.",
    "pecbox: legge una casella PEC/IMAP, categorizza i messaggi, salva gli allegati ed esporta un report."
);
msg!(
    help_cmd_run,
    "Connect to the configured IMAP account and process the mailbox",
    "Connettiti all'account IMAP configurato ed elabora la casella"
);
msg!(
    help_cmd_scan,
    "Process a directory of .eml files instead of a live mailbox",
    "Elabora una cartella di file .eml invece di una casella remota"
);
msg!(
    help_cmd_init_config,
    "Write a configuration template",
    "Scrivi un modello di configurazione"
);
msg!(
    help_cmd_completions,
    "Generate shell completions",
    "Genera i completamenti per la shell"
);
msg!(help_cmd_manpage, "Generate a man page", "Genera la pagina di manuale");

// ── Progress and results ────────────────────────────────────────

msg!(msg_connected, "Connected to", "Connesso a");
msg!(msg_folder_selected, "Folder selected", "Cartella selezionata");
msg!(msg_found, "message(s) found", "email trovate");
msg!(msg_processing, "Processing", "Elaborazione");
msg!(msg_extracting, "Extracting", "Estrazione");
msg!(
    msg_attachments_saved,
    "attachment(s) saved to",
    "allegati scaricati in"
);
msg!(msg_report_saved, "Report saved", "Report salvato");
msg!(msg_connection_closed, "Connection closed", "Connessione chiusa");
msg!(msg_skipped, "Skipped", "Saltate");
msg!(msg_elapsed, "Elapsed", "Tempo impiegato");
msg!(msg_config_written, "Configuration template written to", "Modello di configurazione scritto in");

// ── Statistics ───────────────────────────────────────────────────

msg!(msg_statistics, "STATISTICS", "STATISTICHE");
msg!(msg_total_messages, "Total messages", "Totale email");
msg!(msg_with_attachments, "With attachments", "Email con allegati");
msg!(msg_by_category, "By category", "Per categoria");
msg!(msg_top_senders, "Top senders", "Mittenti principali");

// ── Errors ───────────────────────────────────────────────────────

msg!(
    err_no_config,
    "No account configured. Run 'pecbox init-config', fill in server, address and password (or set PECBOX_SERVER, PECBOX_ADDRESS, PECBOX_PASSWORD).",
    "Nessun account configurato. Esegui 'pecbox init-config' e compila server, indirizzo e password (oppure imposta PECBOX_SERVER, PECBOX_ADDRESS, PECBOX_PASSWORD)."
);
msg!(
    err_dir_not_found,
    "Directory not found",
    "Cartella non trovata"
);
