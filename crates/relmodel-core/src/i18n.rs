//! Translation service boundary.

/// Host-provided translation collaborator.
///
/// Consulted only for models whose schema declares translation-enabled
/// columns; when `need_translation()` is false the query builder skips the
/// shadow-table join entirely.
pub trait TranslationService {
    /// Whether the current request runs in a non-default language.
    fn need_translation(&self) -> bool;

    /// Current language code.
    fn language(&self) -> String;

    /// Translate text from the default language to the current one.
    fn translate_default_to_current(&self, text: &str) -> String;

    /// Translate text from the current language back to the default.
    fn translate_current_to_default(&self, text: &str) -> String;
}
