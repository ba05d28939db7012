//! Error location helpers and small `syn` utilities.
use std::io;
use std::panic::Location;

/// Wrap `err` into a boxed error naming the caller's source location.
#[track_caller]
pub fn error_with_location<E>(err: E) -> Box<dyn std::error::Error>
where
    E: std::fmt::Display,
{
    let loc = Location::caller();
    Box::new(io::Error::other(format!(
        "{} at {}:{}",
        err,
        loc.file(),
        loc.line()
    )))
}

/// `?` for functions returning `Box<dyn Error>`, recording where the error
/// surfaced.
#[macro_export]
macro_rules! loc_try {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(err) => return Err($crate::error_with_location(err)),
        }
    };
}

/// True for `#[test]` and `#[cfg(test)]` style attributes. `cfg(not(test))`
/// items are kept.
pub(crate) fn has_test_attr(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|a| {
        if a.path().is_ident("test") {
            return true;
        }
        if !a.path().is_ident("cfg") {
            return false;
        }
        match &a.meta {
            syn::Meta::List(l) => {
                let tokens = l.tokens.to_string();
                tokens.contains("test") && !tokens.contains("not")
            }
            _ => false,
        }
    })
}

/// Segment identifiers of a path, without generic arguments.
pub(crate) fn path_idents(path: &syn::Path) -> Vec<String> {
    path.segments.iter().map(|s| s.ident.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_are_detected() {
        let f: syn::ItemFn = syn::parse_quote! {
            #[cfg(test)]
            fn a() {}
        };
        assert!(has_test_attr(&f.attrs));
        let g: syn::ItemFn = syn::parse_quote! {
            #[cfg(not(test))]
            fn b() {}
        };
        assert!(!has_test_attr(&g.attrs));
    }

    #[test]
    fn path_idents_drop_arguments() {
        let p: syn::Path = syn::parse_quote!(std::collections::HashMap<String, u8>);
        assert_eq!(path_idents(&p), vec!["std", "collections", "HashMap"]);
    }
}
