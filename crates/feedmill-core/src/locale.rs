//! Localization of user-facing error messages.
//!
//! Errors carry an English template plus arguments (see [`Error::template`]).
//! A [`Localizer`] turns that pair into text for a given language. The
//! built-in [`Translator`] ships a few catalogs and falls back to English.

use crate::Error;

pub const DEFAULT_LANGUAGE: &str = "en_US";

/// Renders message templates in a user's language
pub trait Localizer: Send + Sync {
    /// Translate `template` into `language` and fill its `{}` placeholders
    fn translate(&self, language: &str, template: &str, args: &[String]) -> String;

    /// Render an error for display to the user
    fn localize(&self, error: &Error, language: &str) -> String {
        match error.template() {
            Some((template, args)) => self.translate(language, template, &args),
            None => error.to_string(),
        }
    }
}

type Catalog = &'static [(&'static str, &'static str)];

const FR_FR: Catalog = &[
    ("Category not found for this user", "Cette catégorie n'existe pas pour cet utilisateur"),
    ("Unable to execute request: {}", "Impossible d'exécuter la requête : {}"),
    ("Unable to fetch feed (Status Code = {})", "Impossible de récupérer ce flux (code = {})"),
    (
        "Resource not found (404), this feed doesn't exist anymore, check the feed URL",
        "Page introuvable (404), ce flux n'existe plus, vérifiez l'adresse du flux",
    ),
    ("This feed is empty", "Ce flux est vide"),
    ("Unable to normalize encoding: {}", "Impossible de normaliser l'encodage : {}"),
    ("This feed already exists ({})", "Ce flux existe déjà ({})"),
    ("Feed {} not found", "Flux {} introuvable"),
    ("Unable to parse feed: {}", "Impossible de lire ce flux : {}"),
    ("Response too large ({} bytes)", "Réponse trop volumineuse ({} octets)"),
];

const DE_DE: Catalog = &[
    ("Category not found for this user", "Kategorie für diesen Benutzer nicht gefunden"),
    ("Unable to execute request: {}", "Anfrage konnte nicht ausgeführt werden: {}"),
    ("Unable to fetch feed (Status Code = {})", "Abonnement konnte nicht abgerufen werden (Statuscode = {})"),
    (
        "Resource not found (404), this feed doesn't exist anymore, check the feed URL",
        "Ressource nicht gefunden (404), dieses Abonnement existiert nicht mehr, überprüfen Sie die Adresse",
    ),
    ("This feed is empty", "Dieses Abonnement ist leer"),
    ("Unable to normalize encoding: {}", "Zeichenkodierung konnte nicht normalisiert werden: {}"),
    ("This feed already exists ({})", "Dieses Abonnement existiert bereits ({})"),
    ("Feed {} not found", "Abonnement {} nicht gefunden"),
    ("Unable to parse feed: {}", "Abonnement konnte nicht gelesen werden: {}"),
    ("Response too large ({} bytes)", "Antwort zu groß ({} Bytes)"),
];

/// Static catalogs, looked up by exact language code
const CATALOGS: &[(&str, Catalog)] = &[("fr_FR", FR_FR), ("de_DE", DE_DE)];

/// Built-in translator over the static catalogs
#[derive(Debug, Default, Clone)]
pub struct Translator;

impl Translator {
    pub fn new() -> Self {
        Self
    }

    fn lookup(language: &str, template: &str) -> Option<&'static str> {
        CATALOGS
            .iter()
            .find(|(code, _)| *code == language)
            .and_then(|(_, catalog)| catalog.iter().find(|(key, _)| *key == template))
            .map(|(_, translated)| *translated)
    }
}

impl Localizer for Translator {
    fn translate(&self, language: &str, template: &str, args: &[String]) -> String {
        let text = Self::lookup(language, template).unwrap_or(template);
        fill_placeholders(text, args)
    }
}

/// Replace each `{}` in order with the next argument; extra placeholders stay empty
fn fill_placeholders(template: &str, args: &[String]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;

    while let Some(pos) = rest.find("{}") {
        output.push_str(&rest[..pos]);
        if let Some(arg) = args.next() {
            output.push_str(arg);
        }
        rest = &rest[pos + 2..];
    }
    output.push_str(rest);

    output
}
