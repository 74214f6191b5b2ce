//! Named fields of the registration form and how to find them in each section.

use serde::Serialize;
use std::fmt;

use crate::errors::{ProbeError, ProbeResult};
use crate::strategy::{LocatorStrategy, StrategyChain};

/// Which copy of the form a field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Main,
    Iframe,
    Shadow,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Main => "main",
            Section::Iframe => "iframe",
            Section::Shadow => "shadow",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic form fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Field {
    FirstName,
    LastName,
    Email,
    Phone,
    State,
    Gender,
    Terms,
    Submit,
}

impl Field {
    /// Human label, also the key the server echoes back
    pub fn label(&self) -> &'static str {
        match self {
            Field::FirstName => "First Name",
            Field::LastName => "Last Name",
            Field::Email => "Email",
            Field::Phone => "Phone",
            Field::State => "State",
            Field::Gender => "Gender",
            Field::Terms => "Terms",
            Field::Submit => "Submit",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of control a field is, which decides the operations that apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    Text,
    Select,
    Checkbox,
    Radio,
    Button,
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub field: Field,
    pub section: Section,
    pub role: FieldRole,
    pub chain: StrategyChain,
    /// Absent fields are skipped with a note instead of failing
    pub optional: bool,
}

impl FieldDescriptor {
    pub fn new(field: Field, section: Section, role: FieldRole, chain: StrategyChain) -> Self {
        Self {
            field,
            section,
            role,
            chain,
            optional: false,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Name used in logs and resolution errors, e.g. `First Name (iframe)`
    pub fn target(&self) -> String {
        format!("{} ({})", self.field, self.section)
    }
}

/// Lookup table of field descriptors keyed by field and section
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    fields: Vec<FieldDescriptor>,
}

impl FieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor, replacing any existing one for the same field and section
    pub fn insert(&mut self, descriptor: FieldDescriptor) {
        self.fields
            .retain(|d| !(d.field == descriptor.field && d.section == descriptor.section));
        self.fields.push(descriptor);
    }

    pub fn get(&self, field: Field, section: Section) -> ProbeResult<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|d| d.field == field && d.section == section)
            .ok_or_else(|| ProbeError::UnknownField {
                field: field.label().to_string(),
                section: section.to_string(),
            })
    }

    pub fn section(&self, section: Section) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(move |d| d.section == section)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Chains for the registration page: main form labels use `for`, the
    /// iframe copies put controls after bare labels, and the shadow copy is
    /// only reachable through selectors.
    pub fn standard() -> Self {
        use FieldRole::*;
        use LocatorStrategy as S;

        let mut catalog = Self::new();
        let mut add = |field, section, role, chain| {
            catalog.insert(FieldDescriptor::new(field, section, role, chain));
        };

        // Main document
        add(
            Field::FirstName,
            Section::Main,
            Text,
            StrategyChain::starting_with(S::label("First Name"))
                .then(S::id("firstName"))
                .then(S::name("firstName"))
                .then(S::placeholder("First Name"))
                .then(S::xpath("//input[@id='firstName']")),
        );
        add(
            Field::LastName,
            Section::Main,
            Text,
            StrategyChain::starting_with(S::label("Last Name"))
                .then(S::id("lastName"))
                .then(S::name("lastName"))
                .then(S::placeholder("Last Name")),
        );
        add(
            Field::Email,
            Section::Main,
            Text,
            StrategyChain::starting_with(S::label("Email"))
                .then(S::id("email"))
                .then(S::name("email"))
                .then(S::css("input[type='email']")),
        );
        add(
            Field::Phone,
            Section::Main,
            Text,
            StrategyChain::starting_with(S::label("Phone"))
                .then(S::id("phone"))
                .then(S::name("phone")),
        );
        add(
            Field::State,
            Section::Main,
            Select,
            StrategyChain::starting_with(S::label("State"))
                .then(S::id("state"))
                .then(S::name("state"))
                .then(S::css("select")),
        );
        add(
            Field::Gender,
            Section::Main,
            Radio,
            StrategyChain::starting_with(S::name("gender"))
                .then(S::css("input[type='radio']")),
        );
        add(
            Field::Terms,
            Section::Main,
            Checkbox,
            StrategyChain::starting_with(S::label("I agree to the terms"))
                .then(S::id("terms"))
                .then(S::name("terms"))
                .then(S::css("input[type='checkbox']")),
        );
        add(
            Field::Submit,
            Section::Main,
            Button,
            StrategyChain::starting_with(S::id("submitBtn"))
                .then(S::partial_text("Submit"))
                .then(S::css("button[type='submit']")),
        );

        // Iframe copies, shared by the id'd and anonymous frames
        add(
            Field::FirstName,
            Section::Iframe,
            Text,
            StrategyChain::starting_with(S::label("First Name"))
                .then(S::name("fname"))
                .then(S::xpath("//input[@name='fname']")),
        );
        add(
            Field::LastName,
            Section::Iframe,
            Text,
            StrategyChain::starting_with(S::label("Last Name"))
                .then(S::name("lname"))
                .then(S::xpath("//input[@name='lname']")),
        );
        add(
            Field::Email,
            Section::Iframe,
            Text,
            StrategyChain::starting_with(S::label("Email"))
                .then(S::name("email"))
                .then(S::xpath("//input[@name='email']")),
        );
        add(
            Field::State,
            Section::Iframe,
            Select,
            StrategyChain::starting_with(S::label("State"))
                .then(S::name("state"))
                .then(S::css("select")),
        );
        add(
            Field::Terms,
            Section::Iframe,
            Checkbox,
            // A bare label before the submit button would resolve to the button
            StrategyChain::starting_with(S::name("terms"))
                .then(S::css("input[type='checkbox']"))
                .then(S::label("I agree to the terms")),
        );
        add(
            Field::Submit,
            Section::Iframe,
            Button,
            StrategyChain::starting_with(S::partial_text("Submit"))
                .then(S::css("button[type='submit']")),
        );

        // Shadow copy
        add(
            Field::FirstName,
            Section::Shadow,
            Text,
            StrategyChain::starting_with(S::id("shadowFirstName"))
                .then(S::name("firstName"))
                .then(S::placeholder("First Name")),
        );
        add(
            Field::LastName,
            Section::Shadow,
            Text,
            StrategyChain::starting_with(S::id("shadowLastName"))
                .then(S::name("lastName"))
                .then(S::placeholder("Last Name")),
        );
        add(
            Field::Email,
            Section::Shadow,
            Text,
            StrategyChain::starting_with(S::id("shadowEmail"))
                .then(S::name("email"))
                .then(S::css("input[type='email']")),
        );
        add(
            Field::State,
            Section::Shadow,
            Select,
            StrategyChain::starting_with(S::id("shadowState"))
                .then(S::name("state"))
                .then(S::css("select")),
        );
        add(
            Field::Submit,
            Section::Shadow,
            Button,
            StrategyChain::starting_with(S::id("shadowSubmit"))
                .then(S::css("button[type='submit']")),
        );
        catalog.insert(
            FieldDescriptor::new(
                Field::Terms,
                Section::Shadow,
                Checkbox,
                StrategyChain::starting_with(S::id("shadowTerms"))
                    .then(S::name("terms"))
                    .then(S::css("input[type='checkbox']")),
            )
            .optional(),
        );

        catalog
    }
}
