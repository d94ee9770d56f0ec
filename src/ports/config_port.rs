//! Configuration access port trait.

/// Raw string access; typed parsing and validation happen in the loader,
/// which reports bad values with their section and key.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    /// Section names, sorted.
    fn sections(&self) -> Vec<String>;
}
