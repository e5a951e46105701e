// ABOUTME: Handlebars helper functions for rendering run task metadata and bodies
// ABOUTME: Implements built-in functions for environment, encoding, value formatting and version checks

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use handlebars::{Context, Handlebars, Helper, Output, RenderContext, RenderError};
use serde_json::Value as JsonValue;
use std::env;
use uuid::Uuid;

use super::error::VersionMismatchError;

/// Hostname helper - returns the system hostname
pub fn hostname_helper(
    _h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let hostname_os = hostname::get().map_err(|_| RenderError::new("Failed to get hostname"))?;
    let hostname = hostname_os.to_string_lossy();
    out.write(&hostname)?;
    Ok(())
}

/// Timestamp helper - formats current time with optional format string
pub fn timestamp_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let format = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .unwrap_or("%Y-%m-%d %H:%M:%S");

    out.write(&Utc::now().format(format).to_string())?;
    Ok(())
}

pub fn uuid_helper(
    _h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    out.write(&Uuid::new_v4().to_string())?;
    Ok(())
}

/// Environment variable helper - gets environment variable value
pub fn env_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let var_name = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .ok_or_else(|| RenderError::new("env helper requires variable name parameter"))?;

    let default_value = h.param(1).and_then(|v| v.value().as_str()).unwrap_or("");

    let value = env::var(var_name).unwrap_or_else(|_| default_value.to_string());
    out.write(&value)?;
    Ok(())
}

pub fn base64_encode_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let input = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .ok_or_else(|| RenderError::new("base64_encode helper requires input parameter"))?;

    out.write(&BASE64.encode(input.as_bytes()))?;
    Ok(())
}

pub fn base64_decode_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let input = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .ok_or_else(|| RenderError::new("base64_decode helper requires input parameter"))?;

    let decoded_bytes = BASE64
        .decode(input)
        .map_err(|e| RenderError::new(format!("Base64 decode error: {}", e)))?;

    let decoded_str = String::from_utf8(decoded_bytes)
        .map_err(|e| RenderError::new(format!("UTF-8 decode error: {}", e)))?;

    out.write(&decoded_str)?;
    Ok(())
}

pub fn upper_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let input = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .ok_or_else(|| RenderError::new("upper helper requires input parameter"))?;

    out.write(&input.to_uppercase())?;
    Ok(())
}

pub fn lower_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let input = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .ok_or_else(|| RenderError::new("lower helper requires input parameter"))?;

    out.write(&input.to_lowercase())?;
    Ok(())
}

/// Default helper - provides default value if variable is empty
pub fn default_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let value = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");

    let default_value = h
        .param(1)
        .and_then(|v| v.value().as_str())
        .ok_or_else(|| RenderError::new("default helper requires default value parameter"))?;

    out.write(if value.is_empty() { default_value } else { value })?;
    Ok(())
}

/// Serializes any context value as compact JSON, e.g. a previous task's result
pub fn to_json_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let value = h
        .param(0)
        .map(|v| v.value().clone())
        .ok_or_else(|| RenderError::new("to_json helper requires a value parameter"))?;

    let json = serde_json::to_string(&value)
        .map_err(|e| RenderError::new(format!("JSON encode error: {}", e)))?;
    out.write(&json)?;
    Ok(())
}

/// Picks one trimmed element of a separated list: `{{split_index names "," 0}}`
pub fn split_index_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let input = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .ok_or_else(|| RenderError::new("split_index helper requires input parameter"))?;
    let separator = h.param(1).and_then(|v| v.value().as_str()).unwrap_or(",");
    let index = h
        .param(2)
        .and_then(|v| v.value().as_u64())
        .ok_or_else(|| RenderError::new("split_index helper requires an index parameter"))?;

    let part = input
        .split(separator)
        .nth(index as usize)
        .map(str::trim)
        .unwrap_or("");
    out.write(part)?;
    Ok(())
}

/// Fails the render with a [`VersionMismatchError`] unless both versions
/// match: `{{verify_version Config.version "1.0.0"}}`
pub fn verify_version_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let found = h
        .param(0)
        .map(|v| version_string(v.value()))
        .ok_or_else(|| RenderError::new("verify_version helper requires a version parameter"))?;
    let expected = h
        .param(1)
        .map(|v| version_string(v.value()))
        .ok_or_else(|| RenderError::new("verify_version helper requires an expected version"))?;

    if found != expected {
        return Err(RenderError::from_error(
            "verify_version",
            VersionMismatchError { expected, found },
        ));
    }

    out.write("")?;
    Ok(())
}

fn version_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Register all built-in helpers with a Handlebars instance
pub fn register_helpers(
    handlebars: &mut Handlebars,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    handlebars.register_helper("hostname", Box::new(hostname_helper));
    handlebars.register_helper("timestamp", Box::new(timestamp_helper));
    handlebars.register_helper("uuid", Box::new(uuid_helper));
    handlebars.register_helper("env", Box::new(env_helper));
    handlebars.register_helper("base64_encode", Box::new(base64_encode_helper));
    handlebars.register_helper("base64_decode", Box::new(base64_decode_helper));
    handlebars.register_helper("upper", Box::new(upper_helper));
    handlebars.register_helper("lower", Box::new(lower_helper));
    handlebars.register_helper("default", Box::new(default_helper));
    handlebars.register_helper("to_json", Box::new(to_json_helper));
    handlebars.register_helper("split_index", Box::new(split_index_helper));
    handlebars.register_helper("verify_version", Box::new(verify_version_helper));

    Ok(())
}
