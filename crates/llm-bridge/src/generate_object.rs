//! Non-streaming structured object generation.
//!
//! [`generate_object`] resolves the object mode, shapes one request,
//! calls the model once and materializes exactly one schema-valid object:
//!
//! 1. mode = explicit, else the model's preferred mode, else
//!    [`LlmError::NoDefaultObjectMode`] (no backend call is made)
//! 2. request shaped per mode (see [`ObjectParams`])
//! 3. raw text = response text (`json`, `grammar`) or the first tool
//!    call's arguments (`tool`); missing → [`LlmError::NoObjectGenerated`]
//! 4. strict JSON parse; failure → [`LlmError::ObjectParse`]
//! 5. schema validation; failure → [`LlmError::ObjectValidation`]
//!
//! Nothing is retried.
//!
//! ```rust,no_run
//! use llm_bridge::{generate_object, ObjectParams, ObjectSchema};
//! use llm_bridge_core::{DynLanguageModel, LlmError, ObjectMode};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, schemars::JsonSchema)]
//! struct Person {
//!     name: String,
//! }
//!
//! # async fn example(model: &dyn DynLanguageModel) -> Result<(), LlmError> {
//! let schema = ObjectSchema::<Person>::from_type()?;
//! let result = generate_object(
//!     model,
//!     &schema,
//!     ObjectParams {
//!         mode: Some(ObjectMode::Tool),
//!         prompt: Some("Invent a character".into()),
//!         ..Default::default()
//!     },
//! )
//! .await?;
//! println!("{}", result.object.name);
//! # Ok(())
//! # }
//! ```

use llm_bridge_core::{
    DynLanguageModel, FinishReason, GenerateResponse, LlmError, ObjectMode, Usage,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{Span, debug, field, instrument};

use crate::object_schema::ObjectSchema;
use crate::request::{ObjectParams, object_call_options, resolve_mode};

/// The result of a successful [`generate_object`] call.
#[derive(Debug, Clone)]
pub struct GenerateObjectResult<T> {
    /// The validated object.
    pub object: T,
    /// The raw JSON text the model returned.
    pub raw_text: String,
    /// Why the model stopped.
    pub finish_reason: FinishReason,
    /// Token counts reported by the backend.
    pub usage: Usage,
}

/// Generates one schema-valid object with a single model call.
///
/// # Errors
///
/// - [`LlmError::NoDefaultObjectMode`] if no mode was given and the model
///   declares none
/// - [`LlmError::InvalidPrompt`] if the prompt arguments are inconsistent
/// - any error the backend returns, including
///   [`LlmError::UnsupportedMode`]
/// - [`LlmError::NoObjectGenerated`], [`LlmError::ObjectParse`] or
///   [`LlmError::ObjectValidation`] if the response can't be materialized
#[instrument(
    skip_all,
    fields(provider = field::Empty, model = field::Empty, mode = field::Empty)
)]
pub async fn generate_object<T>(
    model: &dyn DynLanguageModel,
    schema: &ObjectSchema<T>,
    params: ObjectParams,
) -> Result<GenerateObjectResult<T>, LlmError>
where
    T: DeserializeOwned,
{
    let metadata = model.metadata();
    let span = Span::current();
    span.record("provider", &*metadata.provider);
    span.record("model", metadata.model_id.as_str());

    let mode = resolve_mode(params.mode, &metadata)?;
    span.record("mode", field::display(mode));

    let options = object_call_options(mode, schema.json_schema(), params)?;
    let response = model.generate_boxed(&options).await?;

    let finish_reason = response.finish_reason;
    let usage = response.usage;
    let raw_text = extract_raw_text(mode, response)?;
    let object = materialize(schema, &raw_text)?;
    debug!(?finish_reason, "Object generated");

    Ok(GenerateObjectResult {
        object,
        raw_text,
        finish_reason,
        usage,
    })
}

/// Picks the field of the response that carries the object for `mode`.
fn extract_raw_text(mode: ObjectMode, response: GenerateResponse) -> Result<String, LlmError> {
    match mode {
        ObjectMode::Json | ObjectMode::Grammar => {
            response.text.ok_or_else(|| LlmError::NoObjectGenerated {
                mode,
                message: "model returned no text".into(),
            })
        }
        ObjectMode::Tool => response
            .tool_calls
            .into_iter()
            .next()
            .map(|call| call.args)
            .ok_or_else(|| LlmError::NoObjectGenerated {
                mode,
                message: "model made no tool call".into(),
            }),
    }
}

/// Strictly parses `raw_text` and validates it against `schema`.
pub(crate) fn materialize<T: DeserializeOwned>(
    schema: &ObjectSchema<T>,
    raw_text: &str,
) -> Result<T, LlmError> {
    let value: Value = serde_json::from_str(raw_text).map_err(|source| {
        debug!(error = %source, "Object text is not valid JSON");
        LlmError::ObjectParse {
            value_text: raw_text.to_owned(),
            source,
        }
    })?;

    schema.validate(&value).map_err(|issues| {
        debug!(issues = issues.len(), "Object failed schema validation");
        LlmError::ObjectValidation {
            value_text: raw_text.to_owned(),
            value,
            issues,
        }
    })
}
