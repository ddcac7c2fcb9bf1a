use crate::error::EncodeError;
use crate::value::{EncodingContext, HostCallable, ScriptValue};

/// Nesting limit for arrays and objects.
///
/// Cycles cannot be expressed through owned `ScriptValue` trees, so the
/// guard only has to stop pathological data built by callers.
pub const MAX_ENCODE_DEPTH: usize = 64;

/// Render `value` as a script-literal expression.
///
/// Evaluating the result in the target runtime reconstructs an equivalent
/// value, with every callable replaced by an invokable stub supplied by
/// `ctx`. For callable-free values the output is standard JSON text, object
/// keys in insertion order.
pub fn encode(value: &ScriptValue, ctx: &dyn EncodingContext) -> Result<String, EncodeError> {
    let mut out = String::new();
    encode_into(value, ctx, 0, &mut out)?;
    Ok(out)
}

fn encode_into(
    value: &ScriptValue,
    ctx: &dyn EncodingContext,
    depth: usize,
    out: &mut String,
) -> Result<(), EncodeError> {
    match value {
        ScriptValue::String(s) => {
            out.push_str(&serde_json::to_string(s)?);
        }
        ScriptValue::Number(n) => {
            out.push_str(&encode_number(*n)?);
        }
        ScriptValue::Bool(b) => {
            out.push_str(if *b { "true" } else { "false" });
        }
        ScriptValue::Null => {
            out.push_str("null");
        }
        ScriptValue::Array(elements) => {
            if depth >= MAX_ENCODE_DEPTH {
                return Err(EncodeError::DepthLimitExceeded(MAX_ENCODE_DEPTH));
            }
            out.push('[');
            for (i, element) in elements.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_into(element, ctx, depth + 1, out)?;
            }
            out.push(']');
        }
        ScriptValue::Object(entries) => {
            if depth >= MAX_ENCODE_DEPTH {
                return Err(EncodeError::DepthLimitExceeded(MAX_ENCODE_DEPTH));
            }
            out.push('{');
            for (i, (key, entry)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                encode_into(entry, ctx, depth + 1, out)?;
            }
            out.push('}');
        }
        ScriptValue::Callable(callable) => {
            // The context owns stub minting; the returned expression is
            // spliced verbatim.
            let stub = match callable {
                HostCallable::Blocking(f) => ctx.register_blocking(f.clone()),
                HostCallable::NonBlocking(f) => ctx.register_non_blocking(f.clone()),
            };
            out.push_str(&stub);
        }
    }
    Ok(())
}

/// Lossless JSON number text.
///
/// Integral values in the f64-exact range print without a fractional part,
/// matching what the script runtime's own stringification would produce.
fn encode_number(n: f64) -> Result<String, EncodeError> {
    if !n.is_finite() {
        return Err(EncodeError::NonFiniteNumber(n));
    }
    const EXACT_INT_BOUND: f64 = 9_007_199_254_740_992.0; // 2^53
    if n == n.trunc() && n.abs() <= EXACT_INT_BOUND {
        return Ok(format!("{}", n as i64));
    }
    Ok(serde_json::to_string(&n)?)
}
