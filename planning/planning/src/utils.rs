use std::fmt::{Display, Error, Formatter};

/// A custom type to extract the formatter and feed it to formal_impl
/// Source: `<https://github.com/rust-lang/rust/issues/46591#issuecomment-350437057>`
pub struct Fmt<F>(pub F)
where
    F: Fn(&mut std::fmt::Formatter) -> std::fmt::Result;

impl<F> std::fmt::Display for Fmt<F>
where
    F: Fn(&mut std::fmt::Formatter) -> std::fmt::Result,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        (self.0)(f)
    }
}

pub fn disp_iter<T: Display>(f: &mut Formatter<'_>, iterable: impl IntoIterator<Item = T>, sep: &str) -> Result<(), Error> {
    let mut i = iterable.into_iter();
    if let Some(first) = i.next() {
        write!(f, "{first}")?;
        for other in i {
            write!(f, "{sep}")?;
            write!(f, "{other}")?;
        }
    }
    Result::Ok(())
}

/// Derives an identifier from `base` that satisfies `is_free`.
///
/// Returns `base` unchanged if it is already free. Otherwise appends (or bumps
/// an existing) `_n` suffix, with the smallest `n >= 2` that is free.
pub fn increment_last_number_until(base: &str, is_free: impl Fn(&str) -> bool) -> String {
    if base.is_empty() || is_free(base) {
        return base.to_string();
    }
    let (stem, mut next) = match base.rsplit_once('_') {
        Some((stem, suffix)) => match suffix.parse::<u64>() {
            Ok(n) => (stem, n + 1),
            Err(_) => (base, 2),
        },
        None => (base, 2),
    };
    loop {
        let candidate = format!("{stem}_{next}");
        if is_free(&candidate) {
            return candidate;
        }
        next += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identifier_uniquification() {
        let mut ids: HashSet<String> = HashSet::new();
        let mut claim = |base: &str, ids: &mut HashSet<String>| {
            let id = increment_last_number_until(base, |candidate| !ids.contains(candidate));
            ids.insert(id.clone());
            id
        };

        assert_eq!("", increment_last_number_until("", |_| false));
        assert_eq!("dede", claim("dede", &mut ids));
        assert_eq!("dede_2", claim("dede", &mut ids));
        assert_eq!("dede_3", claim("dede", &mut ids));
        assert_eq!("dede_4", claim("dede_2", &mut ids));
        assert_eq!("dede_5", claim("dede_4", &mut ids));
        assert_eq!("dede_6", claim("dede_6", &mut ids));
        assert_eq!("didi", claim("didi", &mut ids));
    }
}
