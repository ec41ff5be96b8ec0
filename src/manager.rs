// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Save manager
//!
//! Owns the tracked object list, the identity and asset tables and the
//! runtime spawn records for one session, and builds/applies save tables.
//!
//! A save table holds one map per tracked object keyed by its identity (in
//! tracking order), then `runtimeInstances` and `metadata`. Building walks
//! the tracked objects in batches through [`SaveTableBuilder`], a resumable
//! cursor the host can step once per frame.

use std::sync::Arc;

#[cfg(feature = "profiling")]
use tracing::info_span;
use tracing::{debug, info, warn};

use crate::assets::{Asset, AssetHandle, AssetRegistry};
use crate::component::Component;
use crate::config::SaveConfig;
use crate::convert::ConvertContext;
use crate::entity::{ObjectHandle, SceneEvent};
use crate::error::{Result, SaveError};
use crate::identity::IdentityTable;
use crate::scene::{GameObject, Scene};
use crate::serialization::{deserialize_object, serialize_object, SaveRegistry, TrackedObject};
use crate::spawn::{RuntimeSpawnRecord, SavedSpawn};
use crate::storage::{DataDeserializer, DataSerializer};
use crate::value::{Value, ValueMap};
use crate::worker::EncodeJob;

/// Save table key of the runtime spawn record list
pub const RUNTIME_INSTANCES_KEY: &str = "runtimeInstances";
/// Save table key of the scene metadata map
pub const METADATA_KEY: &str = "metadata";
/// Version string written into the metadata map
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Outcome of applying a save table
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Tracked objects restored from the table
    pub restored: usize,
    /// Objects destroyed because the table had no entry for them (including
    /// their children)
    pub destroyed: usize,
    /// Runtime instances re-created from spawn records
    pub spawned: usize,
    /// Objects or spawn records that could not be restored
    pub failed: usize,
}

/// Progress of a [`SaveTableBuilder`] step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildStatus {
    /// More work remains; the host may yield before the next step
    Yielded { written: usize, remaining: usize },
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BuildPhase {
    Objects,
    Tail,
    Done,
}

/// Resumable save table build.
///
/// Each [`step`](Self::step) writes at most one batch of tracked objects.
/// Batch boundaries never change the key order of the finished table.
pub struct SaveTableBuilder<'m> {
    manager: &'m SaveManager,
    scene: &'m Scene,
    order: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    phase: BuildPhase,
    table: ValueMap,
}

impl<'m> SaveTableBuilder<'m> {
    fn new(manager: &'m SaveManager, scene: &'m Scene) -> Self {
        let order: Vec<usize> = manager
            .tracked
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_runtime_instance())
            .map(|(i, _)| i)
            .collect();
        let batch_size = manager.config.batch_size(order.len());
        Self {
            manager,
            scene,
            table: ValueMap::with_capacity(order.len() + 2),
            order,
            cursor: 0,
            batch_size,
            phase: BuildPhase::Objects,
        }
    }

    /// Override the computed batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_complete(&self) -> bool {
        self.phase == BuildPhase::Done
    }

    /// Table written so far
    pub fn table(&self) -> &ValueMap {
        &self.table
    }

    /// Advance by one batch
    pub fn step(&mut self) -> Result<BuildStatus> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("save_table_step", cursor = self.cursor).entered();

        match self.phase {
            BuildPhase::Objects => {
                let end = (self.cursor + self.batch_size).min(self.order.len());
                let ctx = self.manager.context();
                let mut written = 0;
                for &index in &self.order[self.cursor..end] {
                    let tracked = &self.manager.tracked[index];
                    if let Some((id, data)) = self.manager.write_tracked(self.scene, tracked, &ctx)? {
                        self.table.insert(id, data);
                        written += 1;
                    }
                }
                self.cursor = end;
                if self.cursor >= self.order.len() {
                    self.phase = BuildPhase::Tail;
                }
                Ok(BuildStatus::Yielded {
                    written,
                    remaining: self.order.len() - self.cursor,
                })
            }
            BuildPhase::Tail => {
                let spawns = self.manager.write_spawn_records(self.scene)?;
                self.table.insert(RUNTIME_INSTANCES_KEY, Value::List(spawns));
                self.table.insert(METADATA_KEY, self.manager.scene_metadata(self.scene));
                self.phase = BuildPhase::Done;
                Ok(BuildStatus::Complete)
            }
            BuildPhase::Done => Ok(BuildStatus::Complete),
        }
    }

    /// Run the remaining steps and return the table
    pub fn finish(mut self) -> Result<ValueMap> {
        while self.step()? != BuildStatus::Complete {}
        Ok(self.table)
    }
}

/// Session-scoped save/load orchestrator
pub struct SaveManager {
    registry: Arc<SaveRegistry>,
    config: SaveConfig,
    tracked: Vec<TrackedObject>,
    identities: IdentityTable,
    assets: AssetRegistry,
    spawns: Vec<RuntimeSpawnRecord>,
    session_active: bool,
}

impl SaveManager {
    pub fn new(registry: Arc<SaveRegistry>, config: SaveConfig) -> Self {
        Self {
            registry,
            config,
            tracked: Vec::new(),
            identities: IdentityTable::new(),
            assets: AssetRegistry::new(),
            spawns: Vec::new(),
            session_active: false,
        }
    }

    pub fn registry(&self) -> &Arc<SaveRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SaveConfig {
        &mut self.config
    }

    pub fn identities(&self) -> &IdentityTable {
        &self.identities
    }

    pub fn assets(&self) -> &AssetRegistry {
        &self.assets
    }

    pub fn spawn_records(&self) -> &[RuntimeSpawnRecord] {
        &self.spawns
    }

    /// Conversion context over the current identity and asset tables
    pub fn context(&self) -> ConvertContext<'_> {
        ConvertContext::new(&self.identities, &self.assets)
    }

    // ---- session ----

    /// Activate the session: rebuild the identity table from the scene and
    /// drop tracked objects that are no longer alive. Assets are frozen
    /// until [`end_session`](Self::end_session).
    pub fn begin_session(&mut self, scene: &mut Scene) {
        self.identities.rebuild(scene);
        self.tracked.retain(|t| scene.contains(t.handle()));
        self.spawns.retain(|r| scene.contains(r.instance));
        scene.drain_events();
        self.session_active = true;
        info!(
            scene = scene.name(),
            identities = self.identities.len(),
            tracked = self.tracked.len(),
            assets = self.assets.len(),
            "save session started"
        );
    }

    /// Tear down all session state. Registered assets are kept.
    pub fn end_session(&mut self) {
        self.tracked.clear();
        self.identities.clear();
        self.spawns.clear();
        self.session_active = false;
        info!("save session ended");
    }

    pub fn is_session_active(&self) -> bool {
        self.session_active
    }

    // ---- assets ----

    fn check_assets_mutable(&self) -> Result<()> {
        if self.session_active {
            return Err(SaveError::AssetRegistration(
                "assets cannot change while a session is active".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn register_asset(&mut self, id: impl Into<String>, asset: Asset) -> Result<AssetHandle> {
        self.check_assets_mutable()?;
        self.assets.register(id, asset)
    }

    /// Register under a freshly generated identity
    pub fn register_generated_asset(&mut self, asset: Asset) -> Result<(String, AssetHandle)> {
        self.check_assets_mutable()?;
        self.assets.register_generated(asset)
    }

    pub fn register_prefab(&mut self, id: impl Into<String>, blueprint: GameObject) -> Result<AssetHandle> {
        self.check_assets_mutable()?;
        self.assets.register_prefab(id, blueprint)
    }

    // ---- tracking ----

    /// Start tracking an object. Gives it an identity if it has none;
    /// tracking an already tracked object refreshes its component list.
    pub fn track(&mut self, scene: &mut Scene, handle: ObjectHandle) -> Result<&mut TrackedObject> {
        let index = self.track_index(scene, handle)?;
        Ok(&mut self.tracked[index])
    }

    fn track_index(&mut self, scene: &mut Scene, handle: ObjectHandle) -> Result<usize> {
        self.assign_identity(scene, handle)?;
        let object = scene.get(handle).ok_or(SaveError::ObjectNotFound)?;
        if let Some(index) = self.tracked.iter().position(|t| t.handle() == handle) {
            self.tracked[index].refresh(object, &self.registry);
            return Ok(index);
        }
        self.tracked
            .push(TrackedObject::from_object(handle, object, &self.registry));
        debug!(name = %object.name, "object tracked");
        Ok(self.tracked.len() - 1)
    }

    /// Stop tracking an object. Its identity stays resolvable.
    pub fn untrack(&mut self, handle: ObjectHandle) -> bool {
        let before = self.tracked.len();
        self.tracked.retain(|t| t.handle() != handle);
        self.tracked.len() != before
    }

    pub fn is_tracked(&self, handle: ObjectHandle) -> bool {
        self.tracked.iter().any(|t| t.handle() == handle)
    }

    pub fn tracked(&self) -> &[TrackedObject] {
        &self.tracked
    }

    pub fn tracked_mut(&mut self, handle: ObjectHandle) -> Option<&mut TrackedObject> {
        self.tracked.iter_mut().find(|t| t.handle() == handle)
    }

    /// Make an object referenceable without tracking it. An identity
    /// already used by another live object is regenerated.
    pub fn assign_identity(&mut self, scene: &mut Scene, handle: ObjectHandle) -> Result<String> {
        let object = scene.get_mut(handle).ok_or(SaveError::ObjectNotFound)?;
        let mut id = object.identity_mut().ensure().to_owned();
        if self.identities.resolve(&id).is_some_and(|owner| owner != handle) {
            let fresh = object.identity_mut().regenerate().to_owned();
            warn!(duplicate = %id, replacement = %fresh, "identity already in use, regenerated");
            id = fresh;
        }
        self.identities.insert(id.clone(), handle);
        Ok(id)
    }

    /// Apply pending scene lifecycle events to the internal tables
    pub fn sync(&mut self, scene: &mut Scene) {
        for event in scene.drain_events() {
            match event {
                SceneEvent::Spawned(handle) => {
                    let Some(id) = scene.get(handle).and_then(|o| o.identity().id()) else {
                        continue;
                    };
                    if !self.identities.contains_id(id) {
                        self.identities.insert(id, handle);
                    }
                }
                SceneEvent::Despawned(handle) => self.forget(handle),
            }
        }
    }

    fn forget(&mut self, handle: ObjectHandle) {
        self.identities.remove_handle(handle);
        self.tracked.retain(|t| t.handle() != handle);
        self.spawns.retain(|r| r.instance != handle);
    }

    // ---- lookups ----

    pub fn object_by_identity(&self, id: &str) -> Option<ObjectHandle> {
        self.identities.resolve(id)
    }

    pub fn identity_of(&self, handle: ObjectHandle) -> Option<&str> {
        self.identities.identity_of(handle)
    }

    /// Component `C` of the object with identity `id`
    pub fn component_by_identity<'s, C: Component>(&self, scene: &'s Scene, id: &str) -> Option<&'s C> {
        scene.get(self.identities.resolve(id)?)?.get::<C>()
    }

    // ---- runtime instances ----

    /// Spawn an instance of a registered prefab and track it as a runtime
    /// instance, so loading re-creates it
    pub fn instantiate(&mut self, scene: &mut Scene, prefab_id: &str) -> Result<ObjectHandle> {
        self.instantiate_with_identity(scene, prefab_id, "")
    }

    fn instantiate_with_identity(&mut self, scene: &mut Scene, prefab_id: &str, id: &str) -> Result<ObjectHandle> {
        let prefab = Arc::clone(
            self.assets
                .prefab_by_id(prefab_id)
                .ok_or_else(|| SaveError::AssetNotFound(prefab_id.to_owned()))?,
        );
        let reuse = !id.is_empty() && !self.identities.contains_id(id);
        let instance = if reuse {
            prefab.instantiate_with_identity(id)
        } else {
            prefab.instantiate()
        };
        let handle = scene.spawn(instance);
        let index = self.track_index(scene, handle)?;
        self.tracked[index].mark_runtime_instance();
        self.spawns.push(RuntimeSpawnRecord::new(prefab_id, handle));
        debug!(prefab = prefab_id, "runtime instance spawned");
        Ok(handle)
    }

    /// Destroy an object and its children, dropping them from every table.
    /// Returns the number of objects removed.
    pub fn destroy(&mut self, scene: &mut Scene, handle: ObjectHandle) -> Result<usize> {
        let removed = scene.despawn_recursive(handle)?;
        for (handle, _) in &removed {
            self.forget(*handle);
        }
        Ok(removed.len())
    }

    // ---- building ----

    /// Start a resumable save table build. Component lists of tracked
    /// objects are refreshed first.
    pub fn save_table_builder<'m>(&'m mut self, scene: &'m Scene) -> SaveTableBuilder<'m> {
        for tracked in &mut self.tracked {
            if let Some(object) = scene.get(tracked.handle()) {
                tracked.refresh(object, &self.registry);
            }
        }
        SaveTableBuilder::new(self, scene)
    }

    /// Build the whole save table in one go
    pub fn build_save_table(&mut self, scene: &Scene) -> Result<ValueMap> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("build_save_table", tracked = self.tracked.len()).entered();

        self.save_table_builder(scene).finish()
    }

    fn write_tracked(
        &self,
        scene: &Scene,
        tracked: &TrackedObject,
        ctx: &ConvertContext<'_>,
    ) -> Result<Option<(String, ValueMap)>> {
        let Some(object) = scene.get(tracked.handle()) else {
            warn!("tracked object is no longer alive, skipped");
            return Ok(None);
        };
        let Some(id) = self.identities.identity_of(tracked.handle()) else {
            warn!(name = %object.name, "tracked object has no identity, skipped");
            return Ok(None);
        };
        let data = serialize_object(object, tracked, &self.registry, ctx)?;
        Ok(Some((id.to_owned(), data)))
    }

    fn write_spawn_records(&self, scene: &Scene) -> Result<Vec<Value>> {
        let ctx = self.context();
        let mut records = Vec::with_capacity(self.spawns.len());
        for record in &self.spawns {
            let Some(tracked) = self.tracked.iter().find(|t| t.handle() == record.instance) else {
                continue;
            };
            if let Some((id, data)) = self.write_tracked(scene, tracked, &ctx)? {
                records.push(record.to_value(&id, data));
            }
        }
        Ok(records)
    }

    /// `sceneName`, `sceneIndex` and `version`. Configured scene values
    /// override the scene's own.
    pub fn scene_metadata(&self, scene: &Scene) -> ValueMap {
        let name = if self.config.scene_name.is_empty() {
            scene.name()
        } else {
            self.config.scene_name.as_str()
        };
        let index = if self.config.scene_index != 0 {
            self.config.scene_index
        } else {
            scene.index()
        };
        let mut metadata = ValueMap::with_capacity(3);
        metadata.insert("sceneName", name);
        metadata.insert("sceneIndex", index);
        metadata.insert("version", VERSION);
        metadata
    }

    // ---- applying ----

    /// Restore the scene from a save table.
    ///
    /// Current runtime instances are destroyed, tracked objects with an
    /// entry are restored in tracking order, tracked objects without one are
    /// destroyed, then spawn records are instantiated with their saved
    /// identities and their state replayed once every instance exists.
    /// Restored parent links that would close a cycle are dropped.
    pub fn apply_save_table(&mut self, scene: &mut Scene, table: &ValueMap) -> Result<LoadReport> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("apply_save_table", entries = table.len()).entered();

        let mut report = LoadReport::default();

        let stale: Vec<ObjectHandle> = self.spawns.iter().map(|r| r.instance).collect();
        for handle in stale {
            if scene.contains(handle) {
                self.destroy(scene, handle)?;
            } else {
                self.forget(handle);
            }
        }

        let mut absent = Vec::new();
        let mut restored = Vec::new();
        {
            let ctx = ConvertContext::new(&self.identities, &self.assets);
            for tracked in &self.tracked {
                let Some(id) = self.identities.identity_of(tracked.handle()) else {
                    continue;
                };
                match table.get(id) {
                    Some(Value::Map(data)) => {
                        let Some(object) = scene.get_mut(tracked.handle()) else {
                            continue;
                        };
                        match deserialize_object(object, tracked, data, &self.registry, &ctx) {
                            Ok(()) => {
                                report.restored += 1;
                                restored.push(tracked.handle());
                            }
                            Err(err) => {
                                warn!(id, error = %err, "object could not be restored");
                                report.failed += 1;
                            }
                        }
                    }
                    Some(other) => {
                        warn!(id, found = other.type_name(), "object entry is not a map");
                        report.failed += 1;
                    }
                    None => absent.push(tracked.handle()),
                }
            }
        }

        for handle in absent {
            if scene.contains(handle) {
                report.destroyed += self.destroy(scene, handle)?;
            } else {
                self.forget(handle);
            }
        }

        let entries = table
            .get(RUNTIME_INSTANCES_KEY)
            .and_then(Value::as_list)
            .unwrap_or_default();
        let mut spawned = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(saved) = SavedSpawn::parse(entry) else {
                warn!("malformed runtime instance record, skipped");
                report.failed += 1;
                continue;
            };
            match self.instantiate_with_identity(scene, saved.prefab, saved.id) {
                Ok(handle) => spawned.push((handle, saved.instance)),
                Err(err) => {
                    warn!(prefab = saved.prefab, error = %err, "runtime instance could not be spawned");
                    report.failed += 1;
                }
            }
        }

        let ctx = ConvertContext::new(&self.identities, &self.assets);
        for (handle, data) in spawned {
            let (Some(tracked), Some(object)) = (
                self.tracked.iter().find(|t| t.handle() == handle),
                scene.get_mut(handle),
            ) else {
                continue;
            };
            match deserialize_object(object, tracked, data, &self.registry, &ctx) {
                Ok(()) => {
                    report.spawned += 1;
                    restored.push(handle);
                }
                Err(err) => {
                    warn!(error = %err, "runtime instance state could not be restored");
                    report.failed += 1;
                }
            }
        }

        for handle in restored {
            if scene.contains(handle) {
                scene.detach_if_cyclic(handle);
            }
        }

        info!(
            restored = report.restored,
            destroyed = report.destroyed,
            spawned = report.spawned,
            failed = report.failed,
            "save table applied"
        );
        Ok(report)
    }

    // ---- storage ----

    /// Build the table and write it. With `write_metadata` set, the scene
    /// metadata also goes to the storage's metadata slot.
    pub fn save(&mut self, scene: &Scene, storage: &dyn DataSerializer) -> Result<()> {
        let table = self.build_save_table(scene)?;
        if self.config.write_metadata {
            storage.serialize_with_metadata(&table, &self.scene_metadata(scene))
        } else {
            storage.serialize(&table)
        }
    }

    /// Build the table and write it together with custom metadata
    pub fn save_with_metadata(&mut self, scene: &Scene, storage: &dyn DataSerializer, metadata: &ValueMap) -> Result<()> {
        let table = self.build_save_table(scene)?;
        storage.serialize_with_metadata(&table, metadata)
    }

    /// Build the table on this thread, then encode and write it on a worker
    pub fn save_async(
        &mut self,
        scene: &Scene,
        storage: Arc<dyn DataSerializer>,
        metadata: Option<ValueMap>,
    ) -> Result<EncodeJob> {
        let table = self.build_save_table(scene)?;
        let metadata = metadata.or_else(|| self.config.write_metadata.then(|| self.scene_metadata(scene)));
        EncodeJob::spawn("save-encode", move || match metadata {
            Some(metadata) => storage.serialize_with_metadata(&table, &metadata),
            None => storage.serialize(&table),
        })
    }

    /// Read a table and apply it. `Ok(None)` when nothing was saved.
    pub fn load(&mut self, scene: &mut Scene, storage: &dyn DataDeserializer) -> Result<Option<LoadReport>> {
        match storage.deserialize()? {
            Some(table) => self.apply_save_table(scene, &table).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::Transform;
    use glam::Vec3;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Gold(i32);
    impl Component for Gold {}

    fn manager() -> SaveManager {
        let mut registry = SaveRegistry::with_builtins().unwrap();
        registry
            .register_fields::<Gold, _>(|f| f.field("amount", |g: &Gold| &g.0, |g: &mut Gold| &mut g.0))
            .unwrap();
        SaveManager::new(Arc::new(registry), SaveConfig::default())
    }

    #[test]
    fn test_track_assigns_identity() {
        let mut manager = manager();
        let mut scene = Scene::new("s");
        let h = scene.spawn(GameObject::new("a"));
        manager.begin_session(&mut scene);
        manager.track(&mut scene, h).unwrap();

        let id = scene.get(h).unwrap().identity().id().unwrap().to_owned();
        assert_eq!(manager.object_by_identity(&id), Some(h));
        assert!(manager.is_tracked(h));
        manager.track(&mut scene, h).unwrap();
        assert_eq!(manager.tracked().len(), 1);
    }

    #[test]
    fn test_assets_frozen_during_session() {
        let mut manager = manager();
        let mut scene = Scene::new("s");
        manager.register_prefab("p", GameObject::new("P")).unwrap();
        manager.begin_session(&mut scene);
        assert!(matches!(
            manager.register_prefab("q", GameObject::new("Q")),
            Err(SaveError::AssetRegistration(_))
        ));
        manager.end_session();
        assert!(manager.register_prefab("q", GameObject::new("Q")).is_ok());
    }

    #[test]
    fn test_table_layout() {
        let mut manager = manager();
        let mut scene = Scene::new("Level1").with_index(3);
        let a = scene.spawn(GameObject::new("a").with_identity("id-a").with(Gold(5)));
        manager.begin_session(&mut scene);
        manager.track(&mut scene, a).unwrap();

        let table = manager.build_save_table(&scene).unwrap();
        assert_eq!(
            table.keys().collect::<Vec<_>>(),
            vec!["id-a", RUNTIME_INSTANCES_KEY, METADATA_KEY]
        );
        let meta = table.get_map(METADATA_KEY).unwrap();
        assert_eq!(meta.get("sceneName"), Some(&Value::String("Level1".into())));
        assert_eq!(meta.get("sceneIndex"), Some(&Value::Int32(3)));
        assert_eq!(meta.get("version"), Some(&Value::String(VERSION.into())));
    }

    #[test]
    fn test_builder_steps_in_batches() {
        let mut manager = manager();
        let mut scene = Scene::new("s");
        let handles: Vec<_> = (0..5)
            .map(|i| scene.spawn(GameObject::new(format!("o{i}")).with_identity(format!("o{i}"))))
            .collect();
        manager.begin_session(&mut scene);
        for h in &handles {
            manager.track(&mut scene, *h).unwrap();
        }

        let mut builder = manager.save_table_builder(&scene).with_batch_size(2);
        assert_eq!(builder.step().unwrap(), BuildStatus::Yielded { written: 2, remaining: 3 });
        assert_eq!(builder.step().unwrap(), BuildStatus::Yielded { written: 2, remaining: 1 });
        assert_eq!(builder.step().unwrap(), BuildStatus::Yielded { written: 1, remaining: 0 });
        assert_eq!(builder.step().unwrap(), BuildStatus::Complete);
        assert!(builder.is_complete());
        let keys: Vec<_> = builder.table().keys().take(5).map(str::to_owned).collect();
        assert_eq!(keys, vec!["o0", "o1", "o2", "o3", "o4"]);
    }

    #[test]
    fn test_default_batch_size() {
        let mut manager = manager();
        let mut scene = Scene::new("s");
        let handles: Vec<_> = (0..12).map(|_| scene.spawn(GameObject::new("o"))).collect();
        manager.begin_session(&mut scene);
        for h in handles {
            manager.track(&mut scene, h).unwrap();
        }
        assert_eq!(manager.save_table_builder(&scene).batch_size(), 2);
    }

    #[test]
    fn test_absent_objects_destroyed_on_load() {
        let mut manager = manager();
        let mut scene = Scene::new("s");
        let keep = scene.spawn(GameObject::new("keep").with_identity("keep").with(Gold(1)));
        let drop = scene.spawn(GameObject::new("drop").with_identity("drop"));
        let child = scene.spawn(GameObject::new("child"));
        scene.set_parent(child, Some(drop)).unwrap();
        manager.begin_session(&mut scene);
        manager.track(&mut scene, keep).unwrap();
        manager.track(&mut scene, drop).unwrap();

        let mut table = manager.build_save_table(&scene).unwrap();
        table.remove("drop");
        scene.get_mut(keep).unwrap().get_mut::<Gold>().unwrap().0 = 99;

        let report = manager.apply_save_table(&mut scene, &table).unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(report.destroyed, 2);
        assert!(!scene.contains(drop));
        assert!(!scene.contains(child));
        assert!(!manager.is_tracked(drop));
        assert_eq!(manager.object_by_identity("drop"), None);
        assert_eq!(scene.get(keep).unwrap().get::<Gold>(), Some(&Gold(1)));
    }

    #[test]
    fn test_runtime_instances_respawned() {
        let mut manager = manager();
        manager
            .register_prefab("coin", GameObject::new("Coin").with(Gold(1)))
            .unwrap();
        let mut scene = Scene::new("s");
        manager.begin_session(&mut scene);

        let coin = manager.instantiate(&mut scene, "coin").unwrap();
        scene.get_mut(coin).unwrap().get_mut::<Gold>().unwrap().0 = 25;
        scene.get_mut(coin).unwrap().transform_mut().unwrap().local_position = Vec3::new(1.0, 0.0, 0.0);
        let coin_id = manager.identity_of(coin).unwrap().to_owned();

        let table = manager.build_save_table(&scene).unwrap();
        assert!(!table.contains_key(&coin_id));
        assert_eq!(table.get(RUNTIME_INSTANCES_KEY).unwrap().as_list().unwrap().len(), 1);

        let report = manager.apply_save_table(&mut scene, &table).unwrap();
        assert_eq!(report.spawned, 1);
        assert!(!scene.contains(coin));

        let respawned = manager.object_by_identity(&coin_id).unwrap();
        let object = scene.get(respawned).unwrap();
        assert_eq!(object.get::<Gold>(), Some(&Gold(25)));
        assert_eq!(object.get::<Transform>().unwrap().local_position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(manager.spawn_records().len(), 1);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_unknown_prefab_counted_as_failure() {
        let mut manager = manager();
        let mut scene = Scene::new("s");
        manager.begin_session(&mut scene);
        assert!(matches!(
            manager.instantiate(&mut scene, "missing"),
            Err(SaveError::AssetNotFound(_))
        ));

        let mut record = ValueMap::new();
        record.insert("prefab", "missing");
        record.insert("id", "x");
        record.insert("instance", ValueMap::new());
        let mut table = ValueMap::new();
        table.insert(RUNTIME_INSTANCES_KEY, Value::List(vec![Value::Map(record)]));

        let report = manager.apply_save_table(&mut scene, &table).unwrap();
        assert_eq!(report.failed, 1);
        assert!(scene.is_empty());
    }

    #[test]
    fn test_sync_follows_scene_events() {
        let mut manager = manager();
        let mut scene = Scene::new("s");
        manager.begin_session(&mut scene);
        let h = scene.spawn(GameObject::new("late").with_identity("late"));
        manager.sync(&mut scene);
        assert_eq!(manager.object_by_identity("late"), Some(h));

        manager.track(&mut scene, h).unwrap();
        scene.despawn(h).unwrap();
        manager.sync(&mut scene);
        assert!(!manager.is_tracked(h));
        assert_eq!(manager.object_by_identity("late"), None);
    }

    #[test]
    fn test_component_by_identity() {
        let mut manager = manager();
        let mut scene = Scene::new("s");
        scene.spawn(GameObject::new("bank").with_identity("bank").with(Gold(7)));
        manager.begin_session(&mut scene);
        assert_eq!(manager.component_by_identity::<Gold>(&scene, "bank"), Some(&Gold(7)));
        assert_eq!(manager.component_by_identity::<Gold>(&scene, "nobody"), None);
    }

    fn entry_component<'t>(table: &'t mut ValueMap, id: &str, component: &str) -> &'t mut ValueMap {
        table
            .get_mut(id)
            .and_then(Value::as_map_mut)
            .and_then(|object| object.get_mut(component))
            .and_then(Value::as_map_mut)
            .unwrap()
    }

    #[test]
    fn test_bad_component_field_does_not_block_object() {
        let mut manager = manager();
        let mut scene = Scene::new("s");
        let hero = scene.spawn(GameObject::new("Hero").with_identity("hero").with(Gold(5)));
        manager.begin_session(&mut scene);
        manager.track(&mut scene, hero).unwrap();

        let mut table = manager.build_save_table(&scene).unwrap();
        entry_component(&mut table, "hero", std::any::type_name::<Transform>()).insert("localRotation", "garbage");
        entry_component(&mut table, "hero", std::any::type_name::<Gold>()).insert("amount", 77);
        table
            .get_mut("hero")
            .and_then(Value::as_map_mut)
            .unwrap()
            .insert("name", "Restored");

        let report = manager.apply_save_table(&mut scene, &table).unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(report.failed, 0);
        let object = scene.get(hero).unwrap();
        assert_eq!(object.name, "Restored");
        assert_eq!(object.get::<Gold>(), Some(&Gold(77)));
    }

    #[test]
    fn test_cyclic_parents_dropped_on_load() {
        let mut manager = manager();
        let mut scene = Scene::new("s");
        let a = scene.spawn(GameObject::new("a").with_identity("a"));
        let b = scene.spawn(GameObject::new("b").with_identity("b"));
        manager.begin_session(&mut scene);
        manager.track(&mut scene, a).unwrap();
        manager.track(&mut scene, b).unwrap();

        let mut table = manager.build_save_table(&scene).unwrap();
        let transform = std::any::type_name::<Transform>();
        entry_component(&mut table, "a", transform).insert("parent", "b");
        entry_component(&mut table, "b", transform).insert("parent", "a");

        manager.apply_save_table(&mut scene, &table).unwrap();
        assert_eq!(scene.parent_of(a), None);
        assert_eq!(scene.parent_of(b), Some(a));
        assert!(!scene.ancestors(b).contains(&b));
    }
}
