use std::sync::Arc;

use archetype_save::manager::{METADATA_KEY, RUNTIME_INSTANCES_KEY};
use archetype_save::prelude::*;
use archetype_save::storage::delete_save;
use glam::Vec3;

#[derive(Clone, Debug, Default, PartialEq)]
struct Inventory {
    gold: i32,
    items: Vec<String>,
    owner: Option<ObjectHandle>,
}
impl Component for Inventory {}

fn manager(config: SaveConfig) -> SaveManager {
    let mut registry = SaveRegistry::with_builtins().unwrap();
    registry
        .register_fields::<Inventory, _>(|f| {
            f.field("gold", |c: &Inventory| &c.gold, |c: &mut Inventory| &mut c.gold)
                .list("items", |c: &Inventory| &c.items, |c: &mut Inventory| &mut c.items)
                .field("owner", |c: &Inventory| &c.owner, |c: &mut Inventory| &mut c.owner)
        })
        .unwrap();
    SaveManager::new(Arc::new(registry), config)
}

fn temp_path(ext: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("archetype_save_it_{}.{ext}", uuid::Uuid::new_v4()))
}

/// Player "player" with an inventory owned by chest "chest"; both tracked.
fn populated(manager: &mut SaveManager) -> (Scene, ObjectHandle, ObjectHandle) {
    let mut scene = Scene::new("Dungeon").with_index(2);
    let chest = scene.spawn(GameObject::new("Chest").with_identity("chest").with(Transform::default()));
    let player = scene.spawn(
        GameObject::new("Player")
            .with_identity("player")
            .with(Transform::from_position(Vec3::new(1.5, 2.0, -3.25)))
            .with(Inventory {
                gold: 120,
                items: vec!["sword".into(), "rope".into()],
                owner: Some(chest),
            }),
    );
    manager.begin_session(&mut scene);
    manager.track(&mut scene, chest).unwrap();
    manager.track(&mut scene, player).unwrap();
    (scene, player, chest)
}

fn scramble(scene: &mut Scene, player: ObjectHandle) {
    let object = scene.get_mut(player).unwrap();
    object.name = "Changed".into();
    object.transform_mut().unwrap().local_position = Vec3::ZERO;
    let inventory = object.get_mut::<Inventory>().unwrap();
    inventory.gold = 0;
    inventory.items.clear();
    inventory.owner = None;
}

fn assert_restored(scene: &Scene, player: ObjectHandle, chest: ObjectHandle) {
    let object = scene.get(player).unwrap();
    assert_eq!(object.name, "Player");
    assert_eq!(object.transform().unwrap().local_position, Vec3::new(1.5, 2.0, -3.25));
    let inventory = object.get::<Inventory>().unwrap();
    assert_eq!(inventory.gold, 120);
    assert_eq!(inventory.items, vec!["sword".to_string(), "rope".to_string()]);
    assert_eq!(inventory.owner, Some(chest));
}

#[test]
fn test_save_load_binary_file() {
    let mut manager = manager(SaveConfig::default());
    let (mut scene, player, chest) = populated(&mut manager);
    let path = temp_path("sav");
    let storage = BinaryFile::new(&path).unwrap();

    manager.save(&scene, &storage).unwrap();
    scramble(&mut scene, player);
    let report = manager.load(&mut scene, &storage).unwrap().unwrap();

    assert_eq!(report.restored, 2);
    assert_eq!(report.failed, 0);
    assert_restored(&scene, player, chest);
    delete_save(&path).unwrap();
}

#[test]
fn test_save_load_json_file_with_metadata() {
    let config = SaveConfig {
        format: DataFormat::Json,
        pretty_print: true,
        text_encoding: TextEncoding::Utf16,
        write_metadata: true,
        ..Default::default()
    };
    let mut manager = manager(config.clone());
    let (mut scene, player, chest) = populated(&mut manager);
    let path = temp_path("json");
    let storage = JsonFile::new(&path)
        .unwrap()
        .pretty(config.pretty_print)
        .encoding(config.text_encoding);

    manager.save(&scene, &storage).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xFE]);

    let metadata = storage.custom_metadata().unwrap().unwrap();
    assert_eq!(metadata.get("sceneName"), Some(&Value::from("Dungeon")));
    assert_eq!(metadata.get("sceneIndex").and_then(Value::to_i32), Some(2));

    scramble(&mut scene, player);
    manager.load(&mut scene, &storage).unwrap().unwrap();
    assert_restored(&scene, player, chest);
    delete_save(&path).unwrap();
    assert!(!path.with_extension("meta").exists());
}

#[test]
fn test_save_load_memory_store() {
    let mut manager = manager(SaveConfig::default());
    let (mut scene, player, chest) = populated(&mut manager);
    let store = MemoryStore::new();
    let slot = store.slot("slot-1").unwrap();

    assert_eq!(manager.load(&mut scene, &slot).unwrap(), None);
    manager.save(&scene, &slot).unwrap();
    assert!(store.get("slot-1").unwrap().starts_with("{\"chest\":"));

    scramble(&mut scene, player);
    manager.load(&mut scene, &slot).unwrap().unwrap();
    assert_restored(&scene, player, chest);
}

#[test]
fn test_save_async_then_load() {
    let mut manager = manager(SaveConfig::default());
    let (mut scene, player, chest) = populated(&mut manager);
    let store = MemoryStore::new();
    let slot = Arc::new(store.slot("async").unwrap());

    let job = manager.save_async(&scene, slot.clone(), None).unwrap();
    job.join().unwrap();
    assert!(store.contains("async"));

    scramble(&mut scene, player);
    manager.load(&mut scene, &*slot).unwrap().unwrap();
    assert_restored(&scene, player, chest);
}

#[test]
fn test_table_order_with_batches() {
    let mut manager = manager(SaveConfig::default());
    let mut scene = Scene::new("s");
    let handles: Vec<ObjectHandle> = (1..=5)
        .map(|i| scene.spawn(GameObject::new(format!("o{i}")).with_identity(format!("o{i}"))))
        .collect();
    manager.begin_session(&mut scene);
    for &h in &handles {
        manager.track(&mut scene, h).unwrap();
    }

    let mut builder = manager.save_table_builder(&scene).with_batch_size(2);
    assert_eq!(builder.step().unwrap(), BuildStatus::Yielded { written: 2, remaining: 3 });
    assert_eq!(builder.table().keys().collect::<Vec<_>>(), vec!["o1", "o2"]);
    assert_eq!(builder.step().unwrap(), BuildStatus::Yielded { written: 2, remaining: 1 });
    assert_eq!(builder.step().unwrap(), BuildStatus::Yielded { written: 1, remaining: 0 });
    assert!(!builder.is_complete());
    assert_eq!(builder.step().unwrap(), BuildStatus::Complete);
    assert!(builder.is_complete());

    let batched = builder.finish().unwrap();
    assert_eq!(
        batched.keys().collect::<Vec<_>>(),
        vec!["o1", "o2", "o3", "o4", "o5", RUNTIME_INSTANCES_KEY, METADATA_KEY]
    );
    assert_eq!(batched, manager.build_save_table(&scene).unwrap());
}

#[test]
fn test_objects_missing_from_save_are_destroyed() {
    let mut manager = manager(SaveConfig::default());
    let (mut scene, _player, _chest) = populated(&mut manager);
    let table = manager.build_save_table(&scene).unwrap();

    let crate_obj = scene.spawn(GameObject::new("Crate").with(Transform::default()));
    let lid = scene.spawn(GameObject::new("Lid").with(Transform::default()));
    scene.set_parent(lid, Some(crate_obj)).unwrap();
    manager.track(&mut scene, crate_obj).unwrap();

    let report = manager.apply_save_table(&mut scene, &table).unwrap();
    assert_eq!(report.destroyed, 2);
    assert!(!scene.contains(crate_obj));
    assert!(!scene.contains(lid));
    assert!(!manager.is_tracked(crate_obj));
    assert_eq!(scene.len(), 2);
}

#[test]
fn test_runtime_instances_recreated() {
    let mut manager = manager(SaveConfig::default());
    manager
        .register_prefab("enemy", GameObject::new("Enemy").with(Inventory::default()))
        .unwrap();
    let (mut scene, _player, chest) = populated(&mut manager);

    let enemy = manager.instantiate(&mut scene, "enemy").unwrap();
    let enemy_id = manager.identity_of(enemy).unwrap().to_owned();
    {
        let inventory = scene.get_mut(enemy).unwrap().get_mut::<Inventory>().unwrap();
        inventory.gold = 7;
        inventory.owner = Some(chest);
    }
    let table = manager.build_save_table(&scene).unwrap();
    assert!(table.get(&enemy_id).is_none());
    assert_eq!(table.get(RUNTIME_INSTANCES_KEY).and_then(Value::as_list).map(<[Value]>::len), Some(1));

    manager.destroy(&mut scene, enemy).unwrap();
    let stale = manager.instantiate(&mut scene, "enemy").unwrap();

    let report = manager.apply_save_table(&mut scene, &table).unwrap();
    assert_eq!(report.spawned, 1);
    assert!(!scene.contains(stale));
    assert_eq!(manager.spawn_records().len(), 1);

    let respawned = manager.object_by_identity(&enemy_id).unwrap();
    let inventory = manager
        .component_by_identity::<Inventory>(&scene, &enemy_id)
        .unwrap();
    assert_eq!(inventory.gold, 7);
    assert_eq!(inventory.owner, Some(chest));
    assert_eq!(scene.get(respawned).unwrap().name, "Enemy");
}

#[test]
fn test_unknown_prefab_fails() {
    let mut manager = manager(SaveConfig::default());
    let mut scene = Scene::new("s");
    manager.begin_session(&mut scene);
    assert!(matches!(
        manager.instantiate(&mut scene, "missing"),
        Err(SaveError::AssetNotFound(_))
    ));
}

#[test]
fn test_corrupt_file_aborts_load() {
    let mut manager = manager(SaveConfig::default());
    let (mut scene, player, _chest) = populated(&mut manager);
    let path = temp_path("sav");
    std::fs::write(&path, b"not a save file").unwrap();
    let storage = BinaryFile::new(&path).unwrap();

    scramble(&mut scene, player);
    let err = manager.load(&mut scene, &storage).unwrap_err();
    assert!(err.is_structural());
    assert_eq!(scene.get(player).unwrap().name, "Changed");
    delete_save(&path).unwrap();
}
