//! Interface description (IDL) of the `spl_practice` program.
//!
//! Two layouts are in circulation. The current one (Anchor 0.30+) has a
//! `metadata` section, snake_case names and explicit discriminators. The
//! legacy one (Anchor 0.26) has top-level `name`/`version`, camelCase names,
//! `isMut`/`isSigner` flags and no discriminators. Both are normalised into
//! the current layout before being deserialized, computing any missing
//! discriminator with the Anchor sighash rule.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SdkError;
use crate::program::{account_discriminator, instruction_discriminator};

const BUNDLED_IDL: &str = include_str!("../idl/spl_practice.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub metadata: IdlMetadata,
    pub instructions: Vec<IdlInstruction>,
    #[serde(default)]
    pub accounts: Vec<IdlAccount>,
    #[serde(default)]
    pub errors: Vec<IdlErrorCode>,
    pub types: Vec<IdlTypeDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdlMetadata {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdlInstruction {
    pub name: String,
    #[serde(default)]
    pub docs: Vec<String>,
    pub discriminator: [u8; 8],
    pub accounts: Vec<IdlInstructionAccount>,
    #[serde(default)]
    pub args: Vec<IdlField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdlInstructionAccount {
    pub name: String,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub signer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pda: Option<IdlPda>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdlPda {
    pub seeds: Vec<IdlSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdlSeed {
    Const { value: Vec<u8> },
    Account { path: String },
    Arg { path: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdlField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdlAccount {
    pub name: String,
    pub discriminator: [u8; 8],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdlErrorCode {
    pub code: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdlTypeDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: IdlTypeDefBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdlTypeDefBody {
    pub kind: String,
    #[serde(default)]
    pub fields: Vec<IdlField>,
}

/// Counts logged when a program client is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdlSummary {
    pub name: String,
    pub version: String,
    pub instructions: usize,
    pub accounts: usize,
    pub types: usize,
}

/// Instructions (name, account count) the client relies on.
const REQUIRED_INSTRUCTIONS: [(&str, usize); 5] = [
    ("create_user_profile", 3),
    ("update_user_profile", 2),
    ("add_balance", 2),
    ("create_token_metadata", 4),
    ("mint_daily_tokens", 7),
];

const REQUIRED_ACCOUNTS: [&str; 3] = ["UserProfile", "TokenMetadata", "DailyMintRecord"];

impl Idl {
    /// The IDL compiled into this crate.
    pub fn bundled() -> Result<Self, SdkError> {
        Self::from_json(BUNDLED_IDL)
    }

    /// Parse and validate an IDL in either layout.
    pub fn from_json(json: &str) -> Result<Self, SdkError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| SdkError::MalformedIdl(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, SdkError> {
        let Value::Object(root) = value else {
            return Err(SdkError::MalformedIdl("IDL is not an object".into()));
        };

        let normalised = if root.contains_key("metadata") {
            normalise_current(root)?
        } else if root.contains_key("name") && root.contains_key("version") {
            normalise_legacy(root)?
        } else {
            return Err(SdkError::MalformedIdl(
                "missing `metadata` (or legacy `name`/`version`)".into(),
            ));
        };

        serde_json::from_value(Value::Object(normalised))
            .map_err(|e| SdkError::MalformedIdl(e.to_string()))
    }

    pub fn instruction(&self, name: &str) -> Option<&IdlInstruction> {
        self.instructions.iter().find(|ix| ix.name == name)
    }

    pub fn account(&self, name: &str) -> Option<&IdlAccount> {
        self.accounts.iter().find(|acc| acc.name == name)
    }

    /// Message of a custom program error code, if the IDL declares it.
    pub fn error_message(&self, code: u32) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.code == code)
            .and_then(|e| e.msg.as_deref())
    }

    /// Check that this IDL describes the program the client was built for:
    /// every required instruction with the expected discriminator and
    /// account count, and every account type with its discriminator.
    pub fn check_compatible(&self) -> Result<(), SdkError> {
        for (name, accounts) in REQUIRED_INSTRUCTIONS {
            let ix = self
                .instruction(name)
                .ok_or_else(|| SdkError::MalformedIdl(format!("missing instruction `{name}`")))?;
            if ix.discriminator != instruction_discriminator(name) {
                return Err(SdkError::MalformedIdl(format!(
                    "instruction `{name}` has an unexpected discriminator"
                )));
            }
            if ix.accounts.len() != accounts {
                return Err(SdkError::MalformedIdl(format!(
                    "instruction `{name}` lists {} accounts, expected {accounts}",
                    ix.accounts.len()
                )));
            }
        }

        for name in REQUIRED_ACCOUNTS {
            let acc = self
                .account(name)
                .ok_or_else(|| SdkError::MalformedIdl(format!("missing account `{name}`")))?;
            if acc.discriminator != account_discriminator(name) {
                return Err(SdkError::MalformedIdl(format!(
                    "account `{name}` has an unexpected discriminator"
                )));
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> IdlSummary {
        IdlSummary {
            name: self.metadata.name.clone(),
            version: self.metadata.version.clone(),
            instructions: self.instructions.len(),
            accounts: self.accounts.len(),
            types: self.types.len(),
        }
    }
}

fn normalise_current(mut root: Map<String, Value>) -> Result<Map<String, Value>, SdkError> {
    require(&root, "metadata", Value::is_object)?;
    require(&root, "instructions", Value::is_array)?;
    require(&root, "types", Value::is_array)?;

    for ix in array_mut(&mut root, "instructions") {
        fill_discriminator(ix, instruction_discriminator)?;
    }
    for acc in array_mut(&mut root, "accounts") {
        fill_discriminator(acc, account_discriminator)?;
    }
    Ok(root)
}

fn normalise_legacy(root: Map<String, Value>) -> Result<Map<String, Value>, SdkError> {
    require(&root, "instructions", Value::is_array)?;
    require(&root, "accounts", Value::is_array)?;

    let mut out = Map::new();
    out.insert(
        "metadata".into(),
        serde_json::json!({
            "name": root.get("name").cloned().unwrap_or(Value::Null),
            "version": root.get("version").cloned().unwrap_or(Value::Null),
        }),
    );

    let mut instructions = Vec::new();
    for ix in root.get("instructions").and_then(Value::as_array).into_iter().flatten() {
        let name = snake_case(str_field(ix, "name")?);
        let accounts = ix
            .get("accounts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|acc| {
                Ok(serde_json::json!({
                    "name": snake_case(str_field(acc, "name")?),
                    "writable": acc.get("isMut").and_then(Value::as_bool).unwrap_or(false),
                    "signer": acc.get("isSigner").and_then(Value::as_bool).unwrap_or(false),
                }))
            })
            .collect::<Result<Vec<_>, SdkError>>()?;
        let args = legacy_fields(ix.get("args"))?;

        instructions.push(serde_json::json!({
            "name": name,
            "discriminator": instruction_discriminator(&name),
            "accounts": accounts,
            "args": args,
        }));
    }
    out.insert("instructions".into(), Value::Array(instructions));

    // Legacy account entries carry their own type definitions.
    let mut accounts = Vec::new();
    let mut types = Vec::new();
    for acc in root.get("accounts").and_then(Value::as_array).into_iter().flatten() {
        let name = str_field(acc, "name")?.to_string();
        let body = acc.get("type").cloned().unwrap_or(Value::Null);
        let kind = body.get("kind").cloned().unwrap_or(Value::from("struct"));
        let fields = legacy_fields(body.get("fields"))?;

        accounts.push(serde_json::json!({
            "name": name,
            "discriminator": account_discriminator(&name),
        }));
        types.push(serde_json::json!({
            "name": name,
            "type": { "kind": kind, "fields": fields },
        }));
    }
    out.insert("accounts".into(), Value::Array(accounts));
    out.insert("types".into(), Value::Array(types));

    if let Some(errors) = root.get("errors") {
        out.insert("errors".into(), errors.clone());
    }
    Ok(out)
}

fn legacy_fields(fields: Option<&Value>) -> Result<Vec<Value>, SdkError> {
    fields
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|f| {
            let ty = match f.get("type") {
                Some(Value::String(s)) if s == "publicKey" => Value::from("pubkey"),
                Some(other) => other.clone(),
                None => return Err(SdkError::MalformedIdl("field without `type`".into())),
            };
            Ok(serde_json::json!({ "name": snake_case(str_field(f, "name")?), "type": ty }))
        })
        .collect()
}

fn fill_discriminator(entry: &mut Value, rule: fn(&str) -> [u8; 8]) -> Result<(), SdkError> {
    if entry.get("discriminator").is_some() {
        return Ok(());
    }
    let disc = rule(str_field(entry, "name")?);
    if let Value::Object(obj) = entry {
        obj.insert("discriminator".into(), serde_json::json!(disc));
    }
    Ok(())
}

fn require(root: &Map<String, Value>, key: &str, ok: fn(&Value) -> bool) -> Result<(), SdkError> {
    match root.get(key) {
        Some(v) if ok(v) => Ok(()),
        Some(_) => Err(SdkError::MalformedIdl(format!("`{key}` has the wrong shape"))),
        None => Err(SdkError::MalformedIdl(format!("missing `{key}`"))),
    }
}

fn array_mut<'a>(root: &'a mut Map<String, Value>, key: &str) -> impl Iterator<Item = &'a mut Value> {
    root.get_mut(key)
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
}

fn str_field<'a>(value: &'a Value, key: &str) -> Result<&'a str, SdkError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| SdkError::MalformedIdl(format!("entry without string `{key}`")))
}

/// `createUserProfile` -> `create_user_profile`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
