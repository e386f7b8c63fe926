use anyhow::Result;
use serde_json::json;
use tokenauth::request_signing::SIGN_FIELD;
use tokenauth::{RequestSigner, SignableParams, TokenAuth};

use crate::cli::{OutputFormat, SignArgs};
use crate::output::{print_success, print_value};

/// Parses `key=value` arguments. Values may contain `=`.
pub fn parse_params(args: &[String]) -> Result<SignableParams> {
    let mut params = SignableParams::new();
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            anyhow::bail!("Invalid parameter \"{arg}\". Expected format: key=value");
        };
        if key.is_empty() {
            anyhow::bail!("Invalid parameter \"{arg}\": empty key");
        }
        params.insert(key, value);
    }
    Ok(params)
}

pub async fn sign(auth: &TokenAuth, args: &SignArgs, format: OutputFormat) -> Result<()> {
    let audience = auth.audiences().get(&args.audience).await?;
    let params = parse_params(&args.params)?;
    let signer = RequestSigner::new().exclude_sign_type(args.exclude_sign_type);

    if args.verify {
        signer.verify_for_audience(&params, &audience)?;
        print_success("Signature is valid");
        return Ok(());
    }

    let signature = signer.sign(&params, &audience.secret)?;
    print_value(
        &json!({
            "canonical": signer.canonicalize(&params),
            SIGN_FIELD: signature,
        }),
        format,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params(&args(&["a=1", "b=x=y", "empty="])).unwrap();
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("b"), Some("x=y"));
        assert_eq!(params.get("empty"), Some(""));
    }

    #[test]
    fn test_parse_params_rejects_malformed() {
        assert!(parse_params(&args(&["novalue"])).is_err());
        assert!(parse_params(&args(&["=1"])).is_err());
    }
}
