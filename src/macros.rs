/// Case-insensitive regex compiled once on first use.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
            regex::RegexBuilder::new($pat).case_insensitive(true).build().unwrap()
        });
        &*RE
    }};
}
