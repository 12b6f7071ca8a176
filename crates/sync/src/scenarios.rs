//! End-to-end flows across the editor, the logs and the caches, all over
//! the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use snippets_core::{Day, FragmentKind, Identity, SnippetKey, YearKey};
use snippets_remote::{MemoryBlobStore, MemoryDocumentStore, RemoteAccessor};

use crate::testing::png;
use crate::{
    Coordinates, EditorStatus, FragmentBuilder, FragmentClock, FragmentLog, ImageResolver, SnippetEditor,
    SnippetRepository,
};

fn remote(docs: Arc<MemoryDocumentStore>) -> RemoteAccessor {
    RemoteAccessor::new(Identity::new("u1").unwrap(), docs, Arc::new(MemoryBlobStore::new()))
}

#[tokio::test(start_paused = true)]
async fn first_entry_of_a_week_shows_up_in_the_year() {
    let docs = Arc::new(MemoryDocumentStore::new());
    let repo = SnippetRepository::new(remote(docs.clone()));
    let key = SnippetKey::new(2024, 10).unwrap();

    let editor = SnippetEditor::open(repo.clone(), key, Duration::from_millis(1000));
    let opened = editor
        .wait_for(|s| s.status != EditorStatus::Loading)
        .await
        .unwrap();
    assert_eq!(opened.status, EditorStatus::Saved);
    assert_eq!(opened.content, "");
    assert!(repo.annual(YearKey(2024)).await.into_value().unwrap().is_empty());

    editor.edit("hello").await.unwrap();
    let saved = editor
        .wait_for(|s| s.edits == 1 && s.is_settled())
        .await
        .unwrap();
    assert_eq!(saved.content, "hello");
    assert_eq!(docs.ops().sets, 1);

    let year = repo.annuals().settled(&YearKey(2024)).await.into_value().unwrap();
    assert_eq!(year.len(), 1);
    assert_eq!((year[0].week, year[0].content.as_str()), (10, "hello"));

    editor.close().await;
}

#[tokio::test]
async fn a_day_with_a_photo_and_a_place() {
    let docs = Arc::new(MemoryDocumentStore::new());
    let remote = remote(docs);
    let builder = FragmentBuilder::new(remote.clone(), Arc::new(FragmentClock::new()), 10);
    let log = FragmentLog::new(remote.clone());
    let images = ImageResolver::new(remote);
    let day: Day = "2024-03-05".parse().unwrap();

    assert!(log.list(day).await.into_value().unwrap().is_empty());

    let photo = builder.image(png(8, 6)).await.unwrap();
    log.append(day, &photo).await.unwrap();
    let fix = Coordinates {
        latitude: 48.8584,
        longitude: 2.2945,
    };
    let place = builder.location(&fix).await.unwrap();
    log.append(day, &place).await.unwrap();

    let fragments = log.days().settled(&day).await.into_value().unwrap();
    let kinds: Vec<_> = fragments.iter().map(|f| f.kind()).collect();
    assert_eq!(kinds, [FragmentKind::Image, FragmentKind::Location]);
    assert_eq!(fragments[0], photo);
    assert_eq!(fragments[1], place);

    let resolved = images.resolve(&fragments[0]).await.unwrap();
    assert_eq!((resolved.width, resolved.height), (8, 6));
    assert!(resolved.url.unwrap().starts_with("memory://users/u1/images/"));

    log.remove(day, &photo.id).await.unwrap();
    let remaining = log.days().settled(&day).await.into_value().unwrap();
    assert_eq!(remaining, vec![place]);
}
