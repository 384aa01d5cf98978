//! Dedup guarantees of the enqueue stages.

mod common;

use std::sync::Arc;

use common::{item, memory_db, stage, task_queue};
use feedcast::dispatch::IdempotencyRepository;
use feedcast::feed::FeedItem;
use feedcast::post::PostTask;
use feedcast::queue::{Channel, TaskStatus};
use feedcast::Database;

#[tokio::test]
async fn test_same_item_enqueued_once_per_channel() {
    let db = memory_db().await;
    let queue = task_queue(&db);
    let post = stage(Channel::Post, &db, &queue);
    let broadcast = stage(Channel::Broadcast, &db, &queue);
    let entry = item("blog", 1);

    assert!(post.enqueue(&entry).await.unwrap());
    assert!(!post.enqueue(&entry).await.unwrap());
    assert!(broadcast.enqueue(&entry).await.unwrap());
    assert!(!broadcast.enqueue(&entry).await.unwrap());

    assert_eq!(queue.count(TaskStatus::Pending).await.unwrap(), 2);
    let records = IdempotencyRepository::new(db.pool(), 3);
    assert_eq!(records.count(Channel::Post).await.unwrap(), 1);
    assert_eq!(records.count(Channel::Broadcast).await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_enqueue_produces_one_task() {
    let db = memory_db().await;
    let queue = task_queue(&db);
    let post = Arc::new(stage(Channel::Post, &db, &queue));
    let entry = item("blog", 7);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let post = post.clone();
        let entry = entry.clone();
        handles.push(tokio::spawn(async move { post.enqueue(&entry).await }));
    }

    let mut queued = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            queued += 1;
        }
    }

    assert_eq!(queued, 1);
    assert_eq!(queue.count(TaskStatus::Pending).await.unwrap(), 1);
    let records = IdempotencyRepository::new(db.pool(), 3);
    assert_eq!(records.count(Channel::Post).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enqueue_on_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("feedcast.db")).await.unwrap();
    let queue = task_queue(&db);
    let post = Arc::new(stage(Channel::Post, &db, &queue));
    let rounds = 20;

    for n in 1..=rounds {
        let entry = item("blog", n);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let post = post.clone();
            let entry = entry.clone();
            handles.push(tokio::spawn(async move { post.enqueue(&entry).await }));
        }

        let mut queued = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                queued += 1;
            }
        }
        assert_eq!(queued, 1, "entry {n} was enqueued {queued} times");
    }

    assert_eq!(queue.count(TaskStatus::Pending).await.unwrap(), i64::from(rounds));
    let records = IdempotencyRepository::new(db.pool(), 3);
    assert_eq!(records.count(Channel::Post).await.unwrap(), i64::from(rounds));
}

#[tokio::test]
async fn test_distinct_items_each_enqueued() {
    let db = memory_db().await;
    let queue = task_queue(&db);
    let post = stage(Channel::Post, &db, &queue);

    for n in 1..=3 {
        assert!(post.enqueue(&item("blog", n)).await.unwrap());
    }

    assert_eq!(queue.count(TaskStatus::Pending).await.unwrap(), 3);
}

#[tokio::test]
async fn test_five_images_split_into_two_posts() {
    let db = memory_db().await;
    let queue = task_queue(&db);
    let post = stage(Channel::Post, &db, &queue);
    let entry: FeedItem = item("gallery", 1)
        .with_images((1..=5).map(|i| format!("https://img.example.com/{i}.jpg")));

    assert!(post.enqueue(&entry).await.unwrap());

    let tasks = queue.list(TaskStatus::Pending).await.unwrap();
    assert_eq!(tasks.len(), 1);
    let payload: PostTask = tasks[0].task.decode().unwrap();
    assert_eq!(payload.requests.len(), 2);
    assert_eq!(payload.requests[0].image_urls.len(), 4);
    assert_eq!(payload.requests[1].image_urls.len(), 1);
    assert!(payload.requests[0].text.contains("https://gallery.example.com/entries/1"));
    assert!(payload.requests[1].text.is_empty());
}
