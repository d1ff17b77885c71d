//! Credential schemas: ordered field specifications plus the discovery and provisioning
//! defaults of one supported service.
//!
//! `field` exposes [`FieldSpec`] and its value-shape constraints. [`CredentialType`] is
//! the immutable bundle a schema registry hands to the engine; its builder enforces unique
//! field names and at most one field per [`FieldRole`].

pub mod field;

pub use field::*;

// std
use std::collections::BTreeSet;
// self
use crate::{
	_prelude::*,
	auth::{CredentialName, FieldName, SecretValue},
	import::StrategyChain,
	provision::Provisioner,
};

/// Errors raised while building schemas or validating values against them.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SchemaError {
	/// Credential types must declare at least one field.
	#[error("Credential type must declare at least one field.")]
	NoFields,
	/// Field names must be unique within a credential type.
	#[error("Field `{field}` is declared more than once.")]
	DuplicateField {
		/// Duplicated field name.
		field: String,
	},
	/// Only one field may carry a given role.
	#[error("More than one field carries the {role} role.")]
	DuplicateRole {
		/// Duplicated role.
		role: FieldRole,
	},
	/// Credential types need a default provisioner.
	#[error("Credential type `{credential}` has no default provisioner.")]
	MissingProvisioner {
		/// Credential type name.
		credential: String,
	},
	/// Documentation or management URLs must parse.
	#[error("The {which} URL is invalid.")]
	InvalidUrl {
		/// Which URL failed to parse.
		which: &'static str,
		/// Underlying parse failure.
		#[source]
		source: url::ParseError,
	},
	/// Documentation or management URLs must use HTTPS.
	#[error("The {which} URL must use HTTPS: {url}.")]
	InsecureUrl {
		/// Which URL failed validation.
		which: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// A required field has no (or an empty) value.
	#[error("Field `{field}` is required.")]
	MissingField {
		/// Field name.
		field: String,
	},
	/// A value was supplied for a field the schema does not declare.
	#[error("Field `{field}` is not part of the credential type.")]
	UnknownField {
		/// Field name.
		field: String,
	},
	/// A value has the wrong number of characters.
	#[error("Field `{field}` must be {expected} characters long, got {actual}.")]
	InvalidLength {
		/// Field name.
		field: String,
		/// Expected character count.
		expected: usize,
		/// Actual character count.
		actual: usize,
	},
	/// A value does not start with the required prefix.
	#[error("Field `{field}` must start with `{prefix}`.")]
	MissingPrefix {
		/// Field name.
		field: String,
		/// Required prefix.
		prefix: String,
	},
	/// A value contains a character outside the allowed charset.
	#[error("Field `{field}` contains a disallowed character at position {position}.")]
	InvalidCharacter {
		/// Field name.
		field: String,
		/// Zero-based character index.
		position: usize,
	},
}

/// Immutable description of one service's credential.
#[derive(Clone)]
pub struct CredentialType {
	/// Credential type name.
	pub name: CredentialName,
	/// Where users can read about the credential.
	pub docs_url: Option<Url>,
	/// Where users can create or revoke the credential.
	pub management_url: Option<Url>,
	fields: Vec<FieldSpec>,
	default_provisioner: Arc<dyn Provisioner>,
	importer: StrategyChain,
}
impl CredentialType {
	/// Creates a new builder for the provided name.
	pub fn builder(name: CredentialName) -> CredentialTypeBuilder {
		CredentialTypeBuilder::new(name)
	}

	/// Fields in declaration order.
	pub fn fields(&self) -> &[FieldSpec] {
		&self.fields
	}

	/// Looks up a field by name.
	pub fn field(&self, name: &str) -> Option<&FieldSpec> {
		self.fields.iter().find(|spec| spec.name.as_ref() == name)
	}

	/// Looks up the field carrying `role`.
	pub fn field_by_role(&self, role: FieldRole) -> Option<&FieldSpec> {
		self.fields.iter().find(|spec| spec.role == Some(role))
	}

	/// Provisioner used when the caller does not pick one.
	pub fn default_provisioner(&self) -> &Arc<dyn Provisioner> {
		&self.default_provisioner
	}

	/// Strategy chain that discovers this credential on the local machine.
	pub fn importer(&self) -> &StrategyChain {
		&self.importer
	}

	/// Validates field values against the schema.
	///
	/// Required fields must be present and non-empty, unknown fields are rejected, and every
	/// value must satisfy its field's [`ValueComposition`].
	pub fn validate(&self, values: &BTreeMap<FieldName, SecretValue>) -> Result<(), SchemaError> {
		if let Some(unknown) = values.keys().find(|name| self.field(name).is_none()) {
			return Err(SchemaError::UnknownField { field: unknown.to_string() });
		}

		for spec in &self.fields {
			match values.get(&spec.name).filter(|value| !value.is_empty()) {
				Some(value) =>
					if let Some(composition) = &spec.composition {
						composition.check(&spec.name, value.expose())?;
					},
				None if spec.optional => {},
				None => return Err(SchemaError::MissingField { field: spec.name.to_string() }),
			}
		}

		Ok(())
	}
}
impl Debug for CredentialType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialType")
			.field("name", &self.name)
			.field("docs_url", &self.docs_url.as_ref().map(Url::as_str))
			.field("management_url", &self.management_url.as_ref().map(Url::as_str))
			.field("fields", &self.fields)
			.field("default_provisioner", &self.default_provisioner.name())
			.field("importer", &self.importer)
			.finish()
	}
}

/// Builder for [`CredentialType`] values.
pub struct CredentialTypeBuilder {
	name: CredentialName,
	docs_url: Option<Url>,
	management_url: Option<Url>,
	fields: Vec<FieldSpec>,
	default_provisioner: Option<Arc<dyn Provisioner>>,
	importer: StrategyChain,
}
impl CredentialTypeBuilder {
	/// Creates a new builder seeded with the provided name.
	pub fn new(name: CredentialName) -> Self {
		Self {
			name,
			docs_url: None,
			management_url: None,
			fields: Vec::new(),
			default_provisioner: None,
			importer: StrategyChain::default(),
		}
	}

	/// Sets the documentation URL.
	pub fn docs_url(mut self, url: Url) -> Self {
		self.docs_url = Some(url);

		self
	}

	/// Sets the management URL.
	pub fn management_url(mut self, url: Url) -> Self {
		self.management_url = Some(url);

		self
	}

	/// Appends a field; declaration order is preserved.
	pub fn field(mut self, spec: FieldSpec) -> Self {
		self.fields.push(spec);

		self
	}

	/// Sets the default provisioner.
	pub fn default_provisioner(mut self, provisioner: Arc<dyn Provisioner>) -> Self {
		self.default_provisioner = Some(provisioner);

		self
	}

	/// Sets the discovery chain.
	pub fn importer(mut self, importer: StrategyChain) -> Self {
		self.importer = importer;

		self
	}

	/// Consumes the builder and validates the resulting credential type.
	pub fn build(self) -> Result<CredentialType, SchemaError> {
		if self.fields.is_empty() {
			return Err(SchemaError::NoFields);
		}

		let mut names = BTreeSet::new();
		let mut roles = BTreeSet::new();

		for spec in &self.fields {
			if !names.insert(spec.name.as_ref()) {
				return Err(SchemaError::DuplicateField { field: spec.name.to_string() });
			}
			if let Some(role) = spec.role
				&& !roles.insert(role)
			{
				return Err(SchemaError::DuplicateRole { role });
			}
		}

		validate_url("docs", self.docs_url.as_ref())?;
		validate_url("management", self.management_url.as_ref())?;

		let default_provisioner = self
			.default_provisioner
			.ok_or_else(|| SchemaError::MissingProvisioner { credential: self.name.to_string() })?;

		Ok(CredentialType {
			name: self.name,
			docs_url: self.docs_url,
			management_url: self.management_url,
			fields: self.fields,
			default_provisioner,
			importer: self.importer,
		})
	}
}

/// Parses a documentation or management URL and checks that it uses HTTPS.
pub fn parse_https_url(which: &'static str, raw: &str) -> Result<Url, SchemaError> {
	let url = Url::parse(raw).map_err(|source| SchemaError::InvalidUrl { which, source })?;

	validate_url(which, Some(&url))?;

	Ok(url)
}

fn validate_url(which: &'static str, url: Option<&Url>) -> Result<(), SchemaError> {
	match url {
		Some(url) if url.scheme() != "https" =>
			Err(SchemaError::InsecureUrl { which, url: url.to_string() }),
		_ => Ok(()),
	}
}
