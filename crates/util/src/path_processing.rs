use std::path::{Path, PathBuf};

use dirs_next::home_dir;

/// Expands a leading `~` in a user supplied path to the home directory.
///
/// Surrounding whitespace is dropped. Both `~/` and `~\` separators are
/// recognised; `~user` forms are left untouched. Without a home directory the
/// path is returned as given.
pub fn expand_tilde(path: &str) -> PathBuf {
    let path = path.trim();
    let remainder = match path {
        "~" => Some(""),
        _ => path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")),
    };
    match (remainder, home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) => home.join(Path::new(rest)),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::expand_tilde;
    use std::path::PathBuf;

    #[test]
    fn leaves_absolute_and_user_relative_paths_alone() {
        assert_eq!(expand_tilde(" /etc/opcall/catalog.json "), PathBuf::from("/etc/opcall/catalog.json"));
        assert_eq!(expand_tilde("~alice/catalog.json"), PathBuf::from("~alice/catalog.json"));
    }

    #[cfg(unix)]
    #[test]
    fn expands_home_prefix_from_home_variable() {
        temp_env::with_var("HOME", Some("/home/opcall"), || {
            assert_eq!(expand_tilde("~/catalogs/cloudapi.json"), PathBuf::from("/home/opcall/catalogs/cloudapi.json"));
            assert_eq!(expand_tilde("~"), PathBuf::from("/home/opcall"));
        });
    }
}
