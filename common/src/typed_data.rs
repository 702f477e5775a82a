use std::collections::{BTreeMap, BTreeSet};

use alloy_dyn_abi::TypedData;
use alloy_primitives::{keccak256, B256};
use alloy_sol_types::Eip712Domain;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{Result, SignError};

/// Name reserved for the domain type. The domain type is derived from the
/// fields present in [`TypedDataDescriptor::domain`]; a declaration under this
/// name in `types` must agree with it.
pub const DOMAIN_TYPE_NAME: &str = "EIP712Domain";

/// The fields an EIP-712 domain may carry, in canonical encoding order.
const DOMAIN_FIELDS: [(&str, &str); 5] = [
    ("name", "string"),
    ("version", "string"),
    ("chainId", "uint256"),
    ("verifyingContract", "address"),
    ("salt", "bytes32"),
];

/// One `(name, type)` entry of a struct type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// An EIP-712 payload in the `eth_signTypedData_v4` JSON shape.
///
/// Invariants checked by [`TypedDataDescriptor::validate`]:
/// - `types[primary_type]` exists;
/// - every message field (recursively, for nested structs) is declared by its
///   struct type, and every declared field is present;
/// - every field type is primitive, an array of a known type, or a key of `types`;
/// - `domain` only uses the five standard domain fields, and a declared
///   `EIP712Domain` type lists exactly the populated ones in canonical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataDescriptor {
    #[serde(default)]
    pub domain: Map<String, Value>,
    pub types: BTreeMap<String, Vec<FieldSpec>>,
    pub primary_type: String,
    #[serde(default)]
    pub message: Map<String, Value>,
}

impl TypedDataDescriptor {
    /// Starts an empty descriptor for `primary_type` under `domain`.
    pub fn new(domain: Map<String, Value>, primary_type: impl Into<String>) -> Self {
        Self {
            domain,
            types: BTreeMap::new(),
            primary_type: primary_type.into(),
            message: Map::new(),
        }
    }

    /// Declares (or replaces) a struct type.
    pub fn with_type(mut self, name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        self.types.insert(name.into(), fields);
        self
    }

    /// Sets one top-level message field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.message.insert(name.into(), value.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SignError::InvalidJson(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SignError::InvalidJson(e.to_string()))
    }

    /// Checks that the message conforms to the declared schema.
    ///
    /// Value encodings (hex widths, integer ranges) are checked later by the
    /// encoder; this pass only covers names and type references.
    pub fn validate(&self) -> Result<()> {
        if !self.types.contains_key(&self.primary_type) {
            return Err(SignError::SchemaMismatch(format!(
                "primary type `{}` is not defined",
                self.primary_type
            )));
        }

        for (type_name, fields) in self.struct_types() {
            let mut seen = BTreeSet::new();
            for field in fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(SignError::SchemaMismatch(format!(
                        "field `{type_name}.{}` is declared twice",
                        field.name
                    )));
                }
                if !self.is_known_type(&field.ty) {
                    return Err(SignError::SchemaMismatch(format!(
                        "field `{type_name}.{}` references undefined type `{}`",
                        field.name, field.ty
                    )));
                }
            }
        }

        self.check_domain()?;
        self.check_struct(&self.primary_type, &self.message, &self.primary_type)
    }

    /// The domain as the encoder sees it. Fails if `domain` carries fields the
    /// encoder would drop or values it cannot represent.
    pub fn eip712_domain(&self) -> Result<Eip712Domain> {
        self.check_domain()?;
        serde_json::from_value(Value::Object(self.domain.clone()))
            .map_err(|e| SignError::SchemaMismatch(format!("invalid domain: {e}")))
    }

    /// The domain fields present, as `(name, type)` in canonical order.
    fn populated_domain_fields(&self) -> Vec<FieldSpec> {
        DOMAIN_FIELDS
            .iter()
            .filter(|(name, _)| self.domain.contains_key(*name))
            .map(|(name, ty)| FieldSpec::new(*name, *ty))
            .collect()
    }

    fn check_domain(&self) -> Result<()> {
        for (key, value) in &self.domain {
            if !DOMAIN_FIELDS.iter().any(|(name, _)| name == key) {
                return Err(SignError::SchemaMismatch(format!(
                    "domain field `{key}` is not a standard {DOMAIN_TYPE_NAME} field"
                )));
            }
            if value.is_null() {
                return Err(SignError::SchemaMismatch(format!("domain field `{key}` is null")));
            }
        }

        if let Some(declared) = self.types.get(DOMAIN_TYPE_NAME) {
            let populated = self.populated_domain_fields();
            if *declared != populated {
                let show = |fields: &[FieldSpec]| {
                    fields
                        .iter()
                        .map(|f| format!("{} {}", f.ty, f.name))
                        .collect::<Vec<_>>()
                        .join(",")
                };
                return Err(SignError::SchemaMismatch(format!(
                    "declared {DOMAIN_TYPE_NAME}({}) does not match the domain fields ({})",
                    show(declared.as_slice()),
                    show(populated.as_slice())
                )));
            }
        }
        Ok(())
    }

    /// Converts into the encoder's representation after validating.
    pub fn to_typed_data(&self) -> Result<TypedData> {
        self.validate()?;
        let types: BTreeMap<&String, &Vec<FieldSpec>> = self.struct_types().collect();
        let value = json!({
            "types": types,
            "primaryType": self.primary_type,
            "domain": self.domain,
            "message": self.message,
        });
        serde_json::from_value(value).map_err(|e| SignError::SchemaMismatch(e.to_string()))
    }

    /// Struct types other than the reserved domain type.
    fn struct_types(&self) -> impl Iterator<Item = (&String, &Vec<FieldSpec>)> {
        self.types
            .iter()
            .filter(|(name, _)| name.as_str() != DOMAIN_TYPE_NAME)
    }

    fn is_known_type(&self, ty: &str) -> bool {
        match array_element(ty) {
            Some(inner) => self.is_known_type(inner),
            None => {
                is_primitive_type(ty) || (ty != DOMAIN_TYPE_NAME && self.types.contains_key(ty))
            }
        }
    }

    fn check_struct(&self, type_name: &str, object: &Map<String, Value>, path: &str) -> Result<()> {
        // Presence of the type was checked by the caller.
        let fields = &self.types[type_name];

        for key in object.keys() {
            if !fields.iter().any(|f| &f.name == key) {
                return Err(SignError::SchemaMismatch(format!(
                    "message field `{path}.{key}` is not declared in `{type_name}`"
                )));
            }
        }
        for field in fields {
            let field_path = format!("{path}.{}", field.name);
            let value = object.get(&field.name).ok_or_else(|| {
                SignError::SchemaMismatch(format!("message is missing field `{field_path}`"))
            })?;
            self.check_value(&field.ty, value, &field_path)?;
        }
        Ok(())
    }

    fn check_value(&self, ty: &str, value: &Value, path: &str) -> Result<()> {
        if let Some(inner) = array_element(ty) {
            let items = value.as_array().ok_or_else(|| {
                SignError::SchemaMismatch(format!("`{path}` must be an array of `{inner}`"))
            })?;
            for (i, item) in items.iter().enumerate() {
                self.check_value(inner, item, &format!("{path}[{i}]"))?;
            }
            return Ok(());
        }
        if is_primitive_type(ty) {
            return Ok(());
        }
        let object = value.as_object().ok_or_else(|| {
            SignError::SchemaMismatch(format!("`{path}` must be an object of type `{ty}`"))
        })?;
        self.check_struct(ty, object, path)
    }
}

/// Returns the element type of `T[]` or `T[N]`.
fn array_element(ty: &str) -> Option<&str> {
    let body = ty.strip_suffix(']')?;
    let open = body.rfind('[')?;
    let len = &body[open + 1..];
    if !len.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(&body[..open])
}

/// Whether `ty` is one of the EIP-712 atomic or dynamic primitive types.
pub fn is_primitive_type(ty: &str) -> bool {
    match ty {
        "string" | "bytes" | "address" | "bool" => return true,
        _ => {}
    }
    if let Some(size) = ty.strip_prefix("bytes") {
        return matches!(size.parse::<u32>(), Ok(n) if (1..=32).contains(&n));
    }
    let bits = ty.strip_prefix("uint").or_else(|| ty.strip_prefix("int"));
    match bits {
        Some(bits) => matches!(bits.parse::<u32>(), Ok(n) if n > 0 && n <= 256 && n % 8 == 0),
        None => false,
    }
}

/// The intermediate values of the EIP-712 hashing algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Parts {
    /// `encodeType` of the primary type, with referenced types appended.
    pub encoded_type: String,
    pub domain_separator: B256,
    /// `hashStruct(message)`.
    pub struct_hash: B256,
    /// keccak256("\x19\x01" || domainSeparator || hashStruct(message))
    pub signing_hash: B256,
}

/// Compute the EIP-712 signing hash of `descriptor`.
///
/// Fails with [`SignError::SchemaMismatch`] if the message does not conform to
/// its schema or a value cannot be encoded as its declared type.
pub fn compute_message_hash(descriptor: &TypedDataDescriptor) -> Result<B256> {
    let typed = descriptor.to_typed_data()?;
    let hash = typed
        .eip712_signing_hash()
        .map_err(|e| SignError::SchemaMismatch(e.to_string()))?;
    debug!(primary_type = %descriptor.primary_type, %hash, "computed EIP-712 message hash");
    Ok(hash)
}

/// Compute the domain separator, struct hash and signing hash separately.
pub fn eip712_parts(descriptor: &TypedDataDescriptor) -> Result<Eip712Parts> {
    let typed = descriptor.to_typed_data()?;
    let encoded_type = typed
        .encode_type()
        .map_err(|e| SignError::SchemaMismatch(e.to_string()))?;
    let domain_separator = typed.domain.separator();
    let struct_hash = typed
        .hash_struct()
        .map_err(|e| SignError::SchemaMismatch(e.to_string()))?;
    let signing_hash = keccak256(
        [&[0x19, 0x01][..], domain_separator.as_slice(), struct_hash.as_slice()].concat(),
    );
    Ok(Eip712Parts {
        encoded_type,
        domain_separator,
        struct_hash,
        signing_hash,
    })
}

/// Compute the EIP-712 digest for any compliant typed-data JSON.
/// Input is a JSON string with `types`, `primaryType`, `domain`, and `message`.
pub fn digest_from_json(typed_data_json: &str) -> Result<B256> {
    let descriptor = TypedDataDescriptor::from_json(typed_data_json)?;
    compute_message_hash(&descriptor)
}
