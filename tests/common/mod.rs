#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use entityform::{
    CustomIdPolicy, Entity, EntitySaver, EntitySchema, EntityValues, Property, SaveError,
    SaveRequest, SchemaRegistry, SchemaTarget,
};

pub fn values(value: Value) -> EntityValues {
    value.as_object().cloned().expect("fixture values are an object")
}

pub fn product() -> EntitySchema {
    EntitySchema::new("Product")
        .with_property("name", Property::string().required())
        .with_property("price", Property::number())
        .with_property("available", Property::boolean())
        .with_property(
            "related",
            Property::reference("products", SchemaTarget::SelfSchema),
        )
}

pub fn registry() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::from_schemas([product()]).expect("registry builds"))
}

pub fn registry_with_custom_id() -> Arc<SchemaRegistry> {
    let schema = product().with_custom_id(CustomIdPolicy::Flag(true));
    Arc::new(SchemaRegistry::from_schemas([schema]).expect("registry builds"))
}

pub fn lamp() -> Entity {
    Entity::existing(
        "p1",
        values(serde_json::json!({"name": "Lamp", "price": 10, "available": true})),
    )
}

/// Records every request and answers with a fixed result.
#[derive(Debug)]
pub struct RecordingSaver {
    pub calls: Mutex<Vec<SaveRequest>>,
    result: Mutex<Result<(), SaveError>>,
}

impl RecordingSaver {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            result: Mutex::new(Ok(())),
        })
    }

    pub fn failing(err: SaveError) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            result: Mutex::new(Err(err)),
        })
    }

    pub fn set_result(&self, result: Result<(), SaveError>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl EntitySaver for RecordingSaver {
    async fn save(&self, request: SaveRequest) -> Result<(), SaveError> {
        self.calls.lock().unwrap().push(request);
        self.result.lock().unwrap().clone()
    }
}

/// Holds every save until the test releases it.
#[derive(Debug, Default)]
pub struct GatedSaver {
    pub calls: Mutex<Vec<SaveRequest>>,
    pub gate: Notify,
}

impl GatedSaver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl EntitySaver for GatedSaver {
    async fn save(&self, request: SaveRequest) -> Result<(), SaveError> {
        self.calls.lock().unwrap().push(request);
        self.gate.notified().await;
        Ok(())
    }
}

/// Never answers.
#[derive(Debug, Default)]
pub struct StalledSaver;

#[async_trait]
impl EntitySaver for StalledSaver {
    async fn save(&self, _request: SaveRequest) -> Result<(), SaveError> {
        std::future::pending().await
    }
}
