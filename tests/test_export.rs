mod support;

use crate::support::{
    analysis_result, jpeg, raw_group, test_config, tracing_init, MockStorage, TestServices, OWNER,
};
use pickperfect::analysis::{GroupType, QualityMetrics};
use pickperfect::cloud_storage::DurableStorage;
use pickperfect::export::{build_archive, ZipArchivePacker};
use pickperfect::grouping::GroupPhoto;
use pickperfect::{ErrorStage, SessionError, SessionManager};
use std::io::{Cursor, Read};
use std::sync::Arc;
use zip::ZipArchive;

fn entries(archive: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut file = zip.by_index(i).unwrap();
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes).unwrap();
            (file.name().to_string(), bytes)
        })
        .collect()
}

/// Commit two photos and serve results that point at `paths`
async fn analyzed_with(
    services: &TestServices,
    manager: &SessionManager,
    groups: impl Fn(&str) -> Vec<pickperfect::analysis::RawGroup> + Send + Sync + 'static,
) {
    manager
        .add_local_files(vec![jpeg("a.jpg", 1), jpeg("b.jpg", 2)])
        .unwrap();
    manager.commit_upload().await.unwrap();
    services
        .analysis
        .set_results(move |sid| analysis_result(sid, groups(sid)));
    manager.start_analysis().await.unwrap();
}

#[tokio::test]
async fn test_download_selected_packs_stored_bytes() {
    tracing_init();
    let services = TestServices::new();
    let manager = services.manager(test_config());

    manager
        .add_local_files(vec![jpeg("a.jpg", 1), jpeg("b.jpg", 2), jpeg("c.jpg", 3)])
        .unwrap();
    manager.commit_upload().await.unwrap();
    services.group_stored_photos();
    manager.start_analysis().await.unwrap();

    let group = manager.current_group().unwrap();
    let chosen: Vec<&GroupPhoto> = group.photos.iter().take(2).collect();
    for photo in &chosen {
        assert!(manager.toggle_selection(&photo.path, true));
    }

    let archive = manager.download_selected().await.unwrap();
    let packed = entries(archive);

    assert_eq!(packed.len(), 2);
    for (photo, (name, bytes)) in chosen.iter().zip(&packed) {
        assert_eq!(name, &photo.filename);
        assert_eq!(bytes, &services.storage.download(&photo.path).await.unwrap());
    }
}

#[tokio::test]
async fn test_best_per_group_deconflicts_names() {
    tracing_init();
    let services = TestServices::new();
    let manager = services.manager(test_config());

    let first = format!("{}/trip/beach.jpg", OWNER);
    let second = format!("{}/home/beach.jpg", OWNER);
    let third = format!("{}/home/dog.png", OWNER);
    services.storage.insert(&first, b"first beach");
    services.storage.insert(&second, b"second beach");
    services.storage.insert(&third, b"dog");

    let paths = (first.clone(), second.clone(), third.clone());
    analyzed_with(&services, &manager, move |_| {
        vec![
            raw_group("g1", GroupType::Duplicate, &[paths.0.clone()], 0.9),
            raw_group("g2", GroupType::Similar, &[paths.2.clone(), paths.1.clone()], 0.8),
        ]
    })
    .await;

    let packed = entries(manager.download_best_per_group().await.unwrap());
    let names: Vec<&str> = packed.iter().map(|(name, _)| name.as_str()).collect();

    // the best of g2 is its last image
    assert_eq!(names, vec!["beach.jpg", "beach (1).jpg"]);
    assert_eq!(packed[0].1, b"first beach");
    assert_eq!(packed[1].1, b"second beach");
}

#[tokio::test]
async fn test_nothing_selected_is_an_export_error() {
    tracing_init();
    let services = TestServices::new();
    let manager = services.manager(test_config());

    let error = manager.download_selected().await.unwrap_err();
    assert!(matches!(error, SessionError::Export(_)));
    assert_eq!(error.stage(), ErrorStage::Export);
    assert_eq!(error.to_string(), "Export failed: Nothing selected to download");
}

#[tokio::test]
async fn test_missing_object_fails_the_whole_archive() {
    tracing_init();
    let services = TestServices::new();
    let manager = services.manager(test_config());

    let present = format!("{}/kept.jpg", OWNER);
    let missing = format!("{}/gone.jpg", OWNER);
    services.storage.insert(&present, b"kept");

    let paths = vec![present, missing];
    analyzed_with(&services, &manager, move |_| {
        vec![raw_group("g", GroupType::Duplicate, &paths, 0.9)]
    })
    .await;
    manager.select_all_in_current_group();
    assert_eq!(manager.selected_paths().len(), 2);

    let error = manager.download_selected().await.unwrap_err();
    match error {
        SessionError::Export(message) => assert!(message.contains("gone.jpg"), "{}", message),
        other => panic!("expected export error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_build_archive_keeps_photo_order() {
    tracing_init();
    let storage = Arc::new(MockStorage::new());
    storage.insert("o/1.jpg", b"one");
    storage.insert("o/2.jpg", b"two");
    storage.insert("o/3.jpg", b"three");
    let storage: Arc<dyn DurableStorage> = storage;

    let photo = |path: &str, filename: &str| GroupPhoto {
        path: path.to_string(),
        filename: filename.to_string(),
        quality: QualityMetrics::default(),
        file_size: 3,
    };
    let photos = vec![
        photo("o/3.jpg", "c.jpg"),
        photo("o/1.jpg", "a.jpg"),
        photo("o/2.jpg", "c.jpg"),
    ];

    let archive = build_archive(&storage, &ZipArchivePacker, &photos, 2)
        .await
        .unwrap();
    let packed = entries(archive);

    let names: Vec<&str> = packed.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["c.jpg", "a.jpg", "c (1).jpg"]);
    assert_eq!(packed[2].1, b"two");
}
