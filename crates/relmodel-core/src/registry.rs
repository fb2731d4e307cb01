//! Name-keyed model registry.
//!
//! Several operations resolve models by name at runtime: lazy many-to-one
//! loading (the declaration stores the target model's name), the translation
//! shadow lookup (`<Model>I18n` by convention), and repository-name
//! validation during mapper resolution. The registry is explicit and
//! caller-owned; there is no ambient global lookup.

use crate::decl::ModelDecl;
use crate::error::{Error, Result};
use crate::model::{Entity, Model};
use std::collections::{HashMap, HashSet};

/// Constructor entry for one registered model.
#[derive(Debug)]
pub struct ModelFactory {
    decl: &'static ModelDecl,
    make: fn() -> Box<dyn Model>,
}

impl ModelFactory {
    /// The registered model's declaration.
    pub fn decl(&self) -> &'static ModelDecl {
        self.decl
    }

    /// Construct a blank instance.
    pub fn make(&self) -> Box<dyn Model> {
        (self.make)()
    }
}

fn make_boxed<M: Entity>() -> Box<dyn Model> {
    Box::new(M::create())
}

/// Registry of model factories and custom repository names.
#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<&'static str, ModelFactory>,
    repositories: HashSet<&'static str>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model type under its declared name.
    pub fn register<M: Entity>(&mut self) {
        tracing::trace!(model = M::DECL.model, "registering model");
        self.models.insert(
            M::DECL.model,
            ModelFactory {
                decl: M::DECL,
                make: make_boxed::<M>,
            },
        );
    }

    /// Register a custom repository name, making it valid for table
    /// declarations to reference.
    pub fn register_repository(&mut self, name: &'static str) {
        self.repositories.insert(name);
    }

    /// Whether a repository name was registered.
    pub fn has_repository(&self, name: &str) -> bool {
        self.repositories.contains(name)
    }

    /// Look up a model factory by name.
    pub fn get(&self, name: &str) -> Option<&ModelFactory> {
        self.models.get(name)
    }

    /// Look up a model factory, failing with `RepositoryClassNotDefined`.
    /// `requester` names the model whose declaration forced the lookup.
    pub fn require(&self, name: &str, requester: &str) -> Result<&ModelFactory> {
        self.get(name).ok_or_else(|| Error::RepositoryClassNotDefined {
            name: name.to_string(),
            model: requester.to_string(),
        })
    }
}
