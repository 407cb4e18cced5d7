//! Storage backends for workflow templates, trigger rules, and instances

use crate::workflow::{
    EntityKey, RuleId, TemplateId, TriggerRule, WorkflowInstance, WorkflowInstanceId,
    WorkflowTemplate,
};
use crate::Result;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Storage backend trait for workflow templates and trigger rules
pub trait TemplateStorageBackend: Send + Sync {
    /// Store a template, overwriting any existing template with the same ID
    fn store_template(&self, template: WorkflowTemplate) -> Result<()>;

    /// Get a template by ID
    fn get_template(&self, id: &TemplateId) -> Result<Option<WorkflowTemplate>>;

    /// List all templates
    fn list_templates(&self) -> Result<Vec<WorkflowTemplate>>;

    /// Store a trigger rule, overwriting any existing rule with the same ID
    fn store_rule(&self, rule: TriggerRule) -> Result<()>;

    /// Remove a trigger rule
    fn remove_rule(&self, id: &RuleId) -> Result<()>;

    /// List all trigger rules
    fn list_rules(&self) -> Result<Vec<TriggerRule>>;
}

/// Storage backend trait for workflow instances
///
/// An instance and its history log persist as one document, so a
/// stored transition is atomic with its audit entry.
pub trait InstanceStorageBackend: Send + Sync {
    /// Store an instance together with its history
    fn store_instance(&self, instance: WorkflowInstance) -> Result<()>;

    /// Get an instance by ID
    fn get_instance(&self, id: &WorkflowInstanceId) -> Result<Option<WorkflowInstance>>;

    /// List all instances
    fn list_instances(&self) -> Result<Vec<WorkflowInstance>>;

    /// The non-terminal instance for an entity, if one exists
    fn active_instance_for(&self, entity: &EntityKey) -> Result<Option<WorkflowInstance>>;
}

/// In-memory template and rule storage
#[derive(Default)]
pub struct MemoryTemplateStorage {
    templates: DashMap<TemplateId, WorkflowTemplate>,
    rules: DashMap<RuleId, TriggerRule>,
}

impl MemoryTemplateStorage {
    /// Create a new empty in-memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateStorageBackend for MemoryTemplateStorage {
    fn store_template(&self, template: WorkflowTemplate) -> Result<()> {
        self.templates.insert(template.id, template);
        Ok(())
    }

    fn get_template(&self, id: &TemplateId) -> Result<Option<WorkflowTemplate>> {
        Ok(self.templates.get(id).map(|t| t.clone()))
    }

    fn list_templates(&self) -> Result<Vec<WorkflowTemplate>> {
        Ok(self.templates.iter().map(|t| t.clone()).collect())
    }

    fn store_rule(&self, rule: TriggerRule) -> Result<()> {
        self.rules.insert(rule.id, rule);
        Ok(())
    }

    fn remove_rule(&self, id: &RuleId) -> Result<()> {
        self.rules
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| crate::FlowgateError::RuleNotFound(id.to_string()))
    }

    fn list_rules(&self) -> Result<Vec<TriggerRule>> {
        Ok(self.rules.iter().map(|r| r.clone()).collect())
    }
}

/// In-memory instance storage
#[derive(Default)]
pub struct MemoryInstanceStorage {
    instances: DashMap<WorkflowInstanceId, WorkflowInstance>,
}

impl MemoryInstanceStorage {
    /// Create a new empty in-memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstanceStorageBackend for MemoryInstanceStorage {
    fn store_instance(&self, instance: WorkflowInstance) -> Result<()> {
        self.instances.insert(instance.id, instance);
        Ok(())
    }

    fn get_instance(&self, id: &WorkflowInstanceId) -> Result<Option<WorkflowInstance>> {
        Ok(self.instances.get(id).map(|i| i.clone()))
    }

    fn list_instances(&self) -> Result<Vec<WorkflowInstance>> {
        Ok(self.instances.iter().map(|i| i.clone()).collect())
    }

    fn active_instance_for(&self, entity: &EntityKey) -> Result<Option<WorkflowInstance>> {
        Ok(self
            .instances
            .iter()
            .find(|i| i.is_active() && i.entity_key == *entity)
            .map(|i| i.clone()))
    }
}

/// Write a JSON document atomically via a temp file and rename
fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut values = Vec::new();
    if !dir.exists() {
        return Ok(values);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        values.push(serde_json::from_str(&content)?);
    }
    Ok(values)
}

/// File-system template and rule storage
///
/// Templates live under `<base>/templates/<id>.json` and rules under
/// `<base>/rules/<id>.json`.
pub struct FileSystemTemplateStorage {
    templates_dir: PathBuf,
    rules_dir: PathBuf,
}

impl FileSystemTemplateStorage {
    /// Create storage rooted at the given base directory
    pub fn new(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref();
        let templates_dir = base.join("templates");
        let rules_dir = base.join("rules");
        fs::create_dir_all(&templates_dir)?;
        fs::create_dir_all(&rules_dir)?;
        Ok(Self {
            templates_dir,
            rules_dir,
        })
    }

    fn template_path(&self, id: &TemplateId) -> PathBuf {
        self.templates_dir.join(format!("{id}.json"))
    }

    fn rule_path(&self, id: &RuleId) -> PathBuf {
        self.rules_dir.join(format!("{id}.json"))
    }
}

impl TemplateStorageBackend for FileSystemTemplateStorage {
    fn store_template(&self, template: WorkflowTemplate) -> Result<()> {
        write_json_atomic(&self.template_path(&template.id), &template)
    }

    fn get_template(&self, id: &TemplateId) -> Result<Option<WorkflowTemplate>> {
        let path = self.template_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn list_templates(&self) -> Result<Vec<WorkflowTemplate>> {
        read_json_dir(&self.templates_dir)
    }

    fn store_rule(&self, rule: TriggerRule) -> Result<()> {
        write_json_atomic(&self.rule_path(&rule.id), &rule)
    }

    fn remove_rule(&self, id: &RuleId) -> Result<()> {
        let path = self.rule_path(id);
        if !path.exists() {
            return Err(crate::FlowgateError::RuleNotFound(id.to_string()));
        }
        fs::remove_file(&path)?;
        Ok(())
    }

    fn list_rules(&self) -> Result<Vec<TriggerRule>> {
        read_json_dir(&self.rules_dir)
    }
}

/// File-system instance storage
///
/// Each instance persists as `<base>/instances/<id>.json` holding the
/// instance and its full history in one document.
pub struct FileSystemInstanceStorage {
    instances_dir: PathBuf,
}

impl FileSystemInstanceStorage {
    /// Create storage rooted at the given base directory
    pub fn new(base: impl AsRef<Path>) -> Result<Self> {
        let instances_dir = base.as_ref().join("instances");
        fs::create_dir_all(&instances_dir)?;
        Ok(Self { instances_dir })
    }

    fn instance_path(&self, id: &WorkflowInstanceId) -> PathBuf {
        self.instances_dir.join(format!("{id}.json"))
    }
}

impl InstanceStorageBackend for FileSystemInstanceStorage {
    fn store_instance(&self, instance: WorkflowInstance) -> Result<()> {
        write_json_atomic(&self.instance_path(&instance.id), &instance)
    }

    fn get_instance(&self, id: &WorkflowInstanceId) -> Result<Option<WorkflowInstance>> {
        let path = self.instance_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn list_instances(&self) -> Result<Vec<WorkflowInstance>> {
        read_json_dir(&self.instances_dir)
    }

    fn active_instance_for(&self, entity: &EntityKey) -> Result<Option<WorkflowInstance>> {
        Ok(self
            .list_instances()?
            .into_iter()
            .find(|i| i.is_active() && i.entity_key == *entity))
    }
}

/// Unified storage facade combining template and instance backends
#[derive(Clone)]
pub struct WorkflowStore {
    templates: Arc<dyn TemplateStorageBackend>,
    instances: Arc<dyn InstanceStorageBackend>,
}

impl WorkflowStore {
    /// Create a store from explicit backends
    pub fn new(
        templates: Arc<dyn TemplateStorageBackend>,
        instances: Arc<dyn InstanceStorageBackend>,
    ) -> Self {
        Self {
            templates,
            instances,
        }
    }

    /// Create a store backed entirely by memory
    pub fn memory() -> Self {
        Self::new(
            Arc::new(MemoryTemplateStorage::new()),
            Arc::new(MemoryInstanceStorage::new()),
        )
    }

    /// Create a store persisting everything under the given directory
    pub fn file_system(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref();
        Ok(Self::new(
            Arc::new(FileSystemTemplateStorage::new(base)?),
            Arc::new(FileSystemInstanceStorage::new(base)?),
        ))
    }

    /// Store a template
    pub fn store_template(&self, template: WorkflowTemplate) -> Result<()> {
        self.templates.store_template(template)
    }

    /// Get a template by ID
    pub fn get_template(&self, id: &TemplateId) -> Result<Option<WorkflowTemplate>> {
        self.templates.get_template(id)
    }

    /// List all templates
    pub fn list_templates(&self) -> Result<Vec<WorkflowTemplate>> {
        self.templates.list_templates()
    }

    /// Store a trigger rule
    pub fn store_rule(&self, rule: TriggerRule) -> Result<()> {
        self.templates.store_rule(rule)
    }

    /// Remove a trigger rule
    pub fn remove_rule(&self, id: &RuleId) -> Result<()> {
        self.templates.remove_rule(id)
    }

    /// List all trigger rules
    pub fn list_rules(&self) -> Result<Vec<TriggerRule>> {
        self.templates.list_rules()
    }

    /// Store an instance together with its history
    pub fn store_instance(&self, instance: WorkflowInstance) -> Result<()> {
        self.instances.store_instance(instance)
    }

    /// Get an instance by ID
    pub fn get_instance(&self, id: &WorkflowInstanceId) -> Result<Option<WorkflowInstance>> {
        self.instances.get_instance(id)
    }

    /// List all instances
    pub fn list_instances(&self) -> Result<Vec<WorkflowInstance>> {
        self.instances.list_instances()
    }

    /// The non-terminal instance for an entity, if one exists
    pub fn active_instance_for(&self, entity: &EntityKey) -> Result<Option<WorkflowInstance>> {
        self.instances.active_instance_for(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::test_helpers::create_three_step_template;
    use crate::workflow::RuleCondition;

    #[test]
    fn test_memory_template_round_trip() {
        let store = WorkflowStore::memory();
        let template = create_three_step_template();
        let id = template.id;

        store.store_template(template.clone()).unwrap();
        let loaded = store.get_template(&id).unwrap().unwrap();
        assert_eq!(loaded, template);
        assert_eq!(store.list_templates().unwrap().len(), 1);
    }

    #[test]
    fn test_memory_missing_template_is_none() {
        let store = WorkflowStore::memory();
        assert!(store.get_template(&TemplateId::new()).unwrap().is_none());
    }

    #[test]
    fn test_memory_remove_unknown_rule_errors() {
        let store = WorkflowStore::memory();
        let result = store.remove_rule(&RuleId::new());
        assert!(matches!(
            result,
            Err(crate::FlowgateError::RuleNotFound(_))
        ));
    }

    #[test]
    fn test_memory_active_instance_lookup() {
        let store = WorkflowStore::memory();
        let template = create_three_step_template();
        let entity = EntityKey::new("estimate", "E-1");
        let mut instance = WorkflowInstance::new(
            template.id,
            entity.clone(),
            "estimates",
            chrono::Utc::now(),
        );
        store.store_instance(instance.clone()).unwrap();

        let active = store.active_instance_for(&entity).unwrap();
        assert_eq!(active.map(|i| i.id), Some(instance.id));

        instance.cancel(chrono::Utc::now());
        store.store_instance(instance).unwrap();
        assert!(store.active_instance_for(&entity).unwrap().is_none());
    }

    #[test]
    fn test_file_system_template_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let store = WorkflowStore::file_system(temp_dir.path()).unwrap();
        let template = create_three_step_template();
        let id = template.id;

        store.store_template(template.clone()).unwrap();

        // A fresh store over the same directory sees the data.
        let reopened = WorkflowStore::file_system(temp_dir.path()).unwrap();
        let loaded = reopened.get_template(&id).unwrap().unwrap();
        assert_eq!(loaded, template);
    }

    #[test]
    fn test_file_system_rules_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let store = WorkflowStore::file_system(temp_dir.path()).unwrap();
        let template = create_three_step_template();
        let rule = TriggerRule::new(
            "estimates",
            RuleCondition::NumberAtLeast {
                attribute: "amount".to_string(),
                threshold: 100_000.0,
            },
            template.id,
            10,
        );
        let rule_id = rule.id;

        store.store_rule(rule).unwrap();
        assert_eq!(store.list_rules().unwrap().len(), 1);
        store.remove_rule(&rule_id).unwrap();
        assert!(store.list_rules().unwrap().is_empty());
    }

    #[test]
    fn test_file_system_instance_persists_history() {
        use crate::workflow::{RoleName, TransitionAction, UserId};

        let temp_dir = tempfile::TempDir::new().unwrap();
        let store = WorkflowStore::file_system(temp_dir.path()).unwrap();
        let template = create_three_step_template();
        let mut instance = WorkflowInstance::new(
            template.id,
            EntityKey::new("bill", "B-9"),
            "bills",
            chrono::Utc::now(),
        );
        instance.history.append(
            UserId::new("ae"),
            RoleName::new("AE"),
            TransitionAction::Forward,
            1,
            Some(2),
            "verified",
            chrono::Utc::now(),
        );
        instance.advance_to(2);
        store.store_instance(instance.clone()).unwrap();

        let loaded = store.get_instance(&instance.id).unwrap().unwrap();
        assert_eq!(loaded, instance);
        assert_eq!(loaded.history.len(), 1);
    }
}
