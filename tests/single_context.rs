//! Portal view lifecycle against in-memory contexts

mod common;

use std::sync::Arc;

use common::{eventually, wait_for, Behavior, FakeFactory, FakeHost};
use lexpilot::browser::{BrowsingContext, SingleContextManager, ViewEvent};
use lexpilot::core::LayoutRect;
use lexpilot::{Config, PilotError};
use serde_json::json;

fn manager(behavior: Behavior) -> (SingleContextManager, Arc<FakeFactory>, Arc<FakeHost>) {
    let factory = FakeFactory::new(behavior);
    let host = FakeHost::new(1280, 800);
    let manager = SingleContextManager::new(factory.clone(), host.clone(), 72);
    (manager, factory, host)
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let (manager, factory, host) = manager(Behavior::default());

    assert!(manager.initialize().await.unwrap());
    assert!(manager.initialize().await.unwrap());

    assert_eq!(factory.created(), 1);
    assert_eq!(host.attached(), vec![factory.context(0).id()]);
}

#[tokio::test]
async fn test_layout_reserves_side_rail() {
    let (manager, factory, host) = manager(Behavior::default());
    manager.initialize().await.unwrap();
    let id = factory.context(0).id();

    assert_eq!(host.bounds_of(id), Some(LayoutRect::new(72, 0, 1208, 800)));
    assert!(host.auto_resize_of(id));

    host.resize(1600, 900);
    manager.update_bounds().await;
    assert_eq!(host.bounds_of(id), Some(LayoutRect::new(72, 0, 1528, 900)));
}

#[tokio::test]
async fn test_calls_before_initialize_fail() {
    let (manager, factory, _host) = manager(Behavior::default());

    let err = manager.execute_script("1").await.unwrap_err();
    assert!(matches!(err, PilotError::UninitializedContext(_)));

    let err = manager.get_page_data().await.unwrap_err();
    assert!(matches!(err, PilotError::UninitializedContext(_)));

    // No-ops rather than errors
    manager.update_bounds().await;
    manager.show().await;
    manager.hide().await;
    assert_eq!(factory.created(), 0);
}

#[tokio::test]
async fn test_navigate_initializes_lazily() {
    let (manager, factory, _host) = manager(Behavior::default());

    manager.navigate_to("https://esaj.tjsp.jus.br").await.unwrap();
    manager.navigate_to("https://esaj.tjsp.jus.br/cpopg").await.unwrap();

    assert_eq!(factory.created(), 1);
    assert_eq!(
        factory.context(0).loads(),
        vec![
            "https://esaj.tjsp.jus.br".to_string(),
            "https://esaj.tjsp.jus.br/cpopg".to_string()
        ]
    );
}

#[tokio::test]
async fn test_aborted_navigation_is_a_hard_failure() {
    let behavior = Behavior::default().with_load_hook(|url| {
        if url.contains("redirect") {
            Err(PilotError::NavigationAborted(url.to_string()))
        } else {
            Ok(())
        }
    });
    let (manager, _factory, _host) = manager(behavior);

    let err = manager
        .navigate_to("https://esaj.tjsp.jus.br/redirect")
        .await
        .unwrap_err();
    assert!(matches!(err, PilotError::NavigationFailed { .. }));
}

#[tokio::test]
async fn test_hide_and_show_keep_the_same_context() {
    let (manager, factory, host) = manager(Behavior::default());
    manager.navigate_to("https://esaj.tjsp.jus.br").await.unwrap();
    let ctx = factory.context(0);

    manager.hide().await;
    assert!(host.attached().is_empty());
    assert!(!ctx.is_destroyed());

    manager.show().await;
    assert_eq!(host.attached(), vec![ctx.id()]);
    assert_eq!(factory.created(), 1);
    assert_eq!(ctx.loads().len(), 1);
}

#[tokio::test]
async fn test_page_data_is_truncated() {
    let long_text = "a".repeat(5000);
    let text = long_text.clone();
    let behavior = Behavior::responding(move |url, _| {
        Ok(json!({ "url": url, "title": "Consulta", "text": text }))
    });
    let factory = FakeFactory::new(behavior);
    let host = FakeHost::new(1280, 800);
    let mut config = Config::default();
    config.executor.page_sample_chars = 100;
    let manager = SingleContextManager::from_config(&config, factory.clone(), host);

    manager.navigate_to("https://esaj.tjsp.jus.br").await.unwrap();
    let page = manager.get_page_data().await.unwrap();

    assert_eq!(page.url, "https://esaj.tjsp.jus.br");
    assert_eq!(page.title, "Consulta");
    assert_eq!(page.text.chars().count(), 100);
}

#[tokio::test]
async fn test_view_events_are_relayed() {
    let (manager, _factory, _host) = manager(Behavior::default());
    manager.initialize().await.unwrap();
    let mut events = manager.subscribe();

    manager.navigate_to("https://esaj.tjsp.jus.br").await.unwrap();

    let url = wait_for(&mut events, |e| matches!(e, ViewEvent::Url { .. })).await;
    assert_eq!(
        url,
        Some(ViewEvent::Url {
            url: "https://esaj.tjsp.jus.br".into()
        })
    );
    assert!(
        wait_for(&mut events, |e| *e == ViewEvent::Loading { loading: false })
            .await
            .is_some()
    );
}

#[tokio::test]
async fn test_shutdown_releases_and_allows_reinitialize() {
    let (manager, factory, host) = manager(Behavior::default());
    manager.initialize().await.unwrap();
    let first = factory.context(0);

    manager.shutdown().await.unwrap();
    assert!(first.is_destroyed());
    assert!(host.attached().is_empty());

    manager.navigate_to("https://esaj.tjsp.jus.br").await.unwrap();
    assert_eq!(factory.created(), 2);
    let second = factory.context(1);
    assert!(eventually(|| second.loads().len() == 1).await);
}
