//! Request Validator (`spec.md` §4.4): once a position token exists, a fixed
//! set of request-time parameters are frozen inside it. Supplying any of
//! them again is a client error naming the offending parameter.

use errors::ErrorMetadata;

/// The request-time parameters a decoded cursor is allowed to accompany.
/// Every field besides `to_hint` must be absent — the cursor already fixes
/// their values for the lifetime of the iteration. `with_descendants` and
/// `recursive` are two query-string spellings of the same session field;
/// kept separate here (rather than merged into one `Option<bool>`) so a
/// conflict error can name whichever one the client actually sent.
#[derive(Default)]
pub struct SubsequentRequestParams {
    pub qp: Option<String>,
    pub index_time: Option<i64>,
    pub with_descendants: Option<bool>,
    pub recursive: Option<bool>,
    pub with_history: Option<bool>,
    pub with_deleted: Option<bool>,
    pub length_hint: Option<u32>,
    pub to_hint: Option<i64>,
}

/// Fails with a client error naming the conflicting parameter if any
/// session-owned field is present alongside a position token.
pub fn validate_against_cursor(params: &SubsequentRequestParams) -> anyhow::Result<()> {
    let conflicts: &[(&str, bool)] = &[
        ("qp", params.qp.is_some()),
        ("index-time", params.index_time.is_some()),
        ("with-descendants", params.with_descendants.is_some()),
        ("recursive", params.recursive.is_some()),
        ("with-history", params.with_history.is_some()),
        ("with-deleted", params.with_deleted.is_some()),
        ("length-hint", params.length_hint.is_some()),
    ];
    for (name, present) in conflicts {
        if *present {
            anyhow::bail!(ErrorMetadata::bad_request(
                "CursorParameterConflict",
                format!("`{name}` is determined in the beginning of the iteration")
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_cursor_and_to_hint() {
        let params = SubsequentRequestParams {
            to_hint: Some(100),
            ..Default::default()
        };
        assert!(validate_against_cursor(&params).is_ok());
    }

    #[test]
    fn rejects_with_history_conflict() {
        let params = SubsequentRequestParams {
            with_history: Some(true),
            ..Default::default()
        };
        let err = validate_against_cursor(&params).unwrap_err();
        assert!(err.to_string().contains("with-history"));
        assert!(err.to_string().contains("determined in the beginning of the iteration"));
    }

    #[test]
    fn rejects_qp_conflict() {
        let params = SubsequentRequestParams {
            qp: Some("foo=bar".to_string()),
            ..Default::default()
        };
        let err = validate_against_cursor(&params).unwrap_err();
        assert!(err.to_string().contains("qp"));
    }
}
