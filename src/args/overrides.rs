use std::collections::HashSet;
use std::ffi::OsString;

/// Splits raw argv into arguments clap should parse and dotted-path
/// overrides: any `--key value` (or `--key=value`) pair whose key is not a
/// declared flag becomes an override applied to the assembled jobs.
pub fn partition_raw_args(
    cmd: &clap::Command,
    raw: Vec<OsString>,
) -> (Vec<OsString>, Vec<(String, String)>) {
    let mut known: HashSet<String> = HashSet::new();
    for arg in cmd.get_arguments() {
        if let Some(long) = arg.get_long() {
            known.insert(long.to_owned());
        }
        for alias in arg.get_all_aliases().unwrap_or_default() {
            known.insert(alias.to_owned());
        }
    }
    known.insert("help".to_owned());
    known.insert("version".to_owned());

    let mut kept: Vec<OsString> = Vec::new();
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.into_iter();
    if let Some(program) = iter.next() {
        kept.push(program);
    }
    while let Some(arg) = iter.next() {
        let text = arg.to_string_lossy().into_owned();
        let Some(flag) = text.strip_prefix("--") else {
            kept.push(arg);
            continue;
        };
        let (key, inline_value) = match flag.split_once('=') {
            Some((key, value)) => (key.to_owned(), Some(value.to_owned())),
            None => (flag.to_owned(), None),
        };
        if known.contains(&key) {
            kept.push(arg);
            continue;
        }
        let value = match inline_value {
            Some(value) => value,
            None => iter
                .next()
                .map(|value| value.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        overrides.push((key, value));
    }
    (kept, overrides)
}
