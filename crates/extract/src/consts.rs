use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// `messages.properties`, `messages_fr.properties`, `messages_pt_BR.properties`.
regex!(
    PROPERTIES_FILE_REGEX,
    r"^(?P<bundle>[^/_]+)(?:_(?P<locale>[A-Za-z]{2,3}(?:_[A-Za-z0-9]{1,8})*))?\.properties$"
);
regex!(LOCALE_JSON_REGEX, r"^(?P<locale>[A-Za-z]{2,3}(?:[-_][A-Za-z0-9]{1,8})*)\.json$");
