use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use blog_follow::{
    error::FollowError,
    follows::{
        FaultPoint, FollowEvent, FollowStore, FollowType, ListOptions, MemoryFollowRepository,
    },
};

fn store() -> (FollowStore, Arc<MemoryFollowRepository>) {
    let repo = Arc::new(MemoryFollowRepository::new());
    (FollowStore::new(repo.clone()), repo)
}

fn ids(values: &[i64]) -> HashSet<i64> {
    values.iter().copied().collect()
}

/// Records events in delivery order.
fn recorder(store: &mut FollowStore) -> Arc<Mutex<Vec<FollowEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    store.subscribe(Arc::new(move |event: &FollowEvent| -> anyhow::Result<()> {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    }));
    seen
}

#[tokio::test]
async fn follow_unfollow_scenario() {
    let (store, _) = store();
    let blogs = FollowType::Blogs;

    assert!(store.follow(42, 7, &blogs).await.unwrap());
    assert!(store.is_following(42, 7, &blogs).await.unwrap());
    assert!(!store.follow(42, 7, &blogs).await.unwrap());
    assert!(store.unfollow(42, 7, &blogs).await.unwrap());
    assert!(!store.is_following(42, 7, &blogs).await.unwrap());
    assert!(!store.unfollow(42, 7, &blogs).await.unwrap());
}

#[tokio::test]
async fn second_follow_does_not_duplicate() {
    let (store, repo) = store();

    assert!(store.follow(5, 6, &FollowType::Default).await.unwrap());
    assert!(!store.follow(5, 6, &FollowType::Default).await.unwrap());

    assert_eq!(repo.len(), 1);
    assert_eq!(
        store
            .get_followers(5, &FollowType::Default, ListOptions::default())
            .await
            .unwrap(),
        vec![6]
    );
}

#[tokio::test]
async fn follow_types_are_separate_namespaces() {
    let (store, _) = store();

    store.follow(10, 1, &FollowType::Blogs).await.unwrap();

    assert!(store.is_following(10, 1, &FollowType::Blogs).await.unwrap());
    assert!(!store.is_following(10, 1, &FollowType::Default).await.unwrap());
    assert_eq!(
        store.get_counts(1, &FollowType::Default).await.unwrap().following,
        0
    );
}

#[tokio::test]
async fn self_follow_is_left_to_callers() {
    let (store, _) = store();

    assert!(store.follow(3, 3, &FollowType::Default).await.unwrap());
    let counts = store.get_counts(3, &FollowType::Default).await.unwrap();
    assert_eq!((counts.followers, counts.following), (1, 1));
}

#[tokio::test]
async fn listings_are_newest_first_by_default() {
    let (store, _) = store();
    for leader in [100, 200, 300] {
        store.follow(leader, 7, &FollowType::Blogs).await.unwrap();
    }
    for follower in [1, 2, 3] {
        store.follow(100, follower, &FollowType::Blogs).await.unwrap();
    }

    let following = store
        .get_following(7, &FollowType::Blogs, ListOptions::default())
        .await
        .unwrap();
    assert_eq!(following, vec![300, 200, 100]);

    let oldest_first = store
        .get_following(7, &FollowType::Blogs, ListOptions::oldest_first())
        .await
        .unwrap();
    assert_eq!(oldest_first, vec![100, 200, 300]);

    let followers = store
        .get_followers(100, &FollowType::Blogs, ListOptions::default())
        .await
        .unwrap();
    assert_eq!(followers, vec![3, 2, 1, 7]);
}

#[tokio::test]
async fn following_count_matches_listing_length() {
    let (store, _) = store();
    let edges = [
        (1, 7, FollowType::Blogs),
        (2, 7, FollowType::Blogs),
        (3, 7, FollowType::Default),
        (7, 4, FollowType::Default),
        (7, 5, FollowType::Blogs),
        (2, 8, FollowType::Blogs),
    ];
    for (leader, follower, follow_type) in &edges {
        store.follow(*leader, *follower, follow_type).await.unwrap();
    }

    for user in [1, 2, 3, 4, 5, 7, 8] {
        for follow_type in [FollowType::Default, FollowType::Blogs] {
            let counts = store.get_counts(user, &follow_type).await.unwrap();
            let following = store
                .get_following(user, &follow_type, ListOptions::default())
                .await
                .unwrap();
            let followers = store
                .get_followers(user, &follow_type, ListOptions::default())
                .await
                .unwrap();

            assert_eq!(counts.following, following.len() as i64, "user {user}");
            assert_eq!(counts.followers, followers.len() as i64, "user {user}");
        }
    }
}

#[tokio::test]
async fn counts_take_a_single_query() {
    let (store, repo) = store();
    store.follow(1, 2, &FollowType::Default).await.unwrap();
    let before = repo.query_count();

    store.get_counts(1, &FollowType::Default).await.unwrap();

    assert_eq!(repo.query_count(), before + 1);
}

#[tokio::test]
async fn bulk_check_on_empty_input_issues_no_query() {
    let (store, repo) = store();

    let followed = store
        .bulk_check_follow_status(&HashSet::new(), 7, &FollowType::Blogs)
        .await
        .unwrap();

    assert!(followed.is_empty());
    assert_eq!(repo.query_count(), 0);
}

#[tokio::test]
async fn bulk_check_returns_exactly_the_followed_subset() {
    let (store, repo) = store();
    let (a, b, c) = (11, 12, 13);
    store.follow(a, 7, &FollowType::Blogs).await.unwrap();
    store.follow(c, 7, &FollowType::Blogs).await.unwrap();
    // Followed, but under another namespace or by someone else
    store.follow(b, 7, &FollowType::Default).await.unwrap();
    store.follow(b, 8, &FollowType::Blogs).await.unwrap();
    let before = repo.query_count();

    let followed = store
        .bulk_check_follow_status(&ids(&[a, b, c]), 7, &FollowType::Blogs)
        .await
        .unwrap();

    assert_eq!(followed, ids(&[a, c]));
    assert_eq!(repo.query_count(), before + 1);
}

#[tokio::test]
async fn delete_all_clears_both_sides_in_every_type() {
    let (store, _) = store();
    store.follow(7, 1, &FollowType::Default).await.unwrap();
    store.follow(7, 2, &FollowType::Blogs).await.unwrap();
    store.follow(3, 7, &FollowType::Default).await.unwrap();
    store.follow(4, 7, &FollowType::Custom("groups".to_string())).await.unwrap();
    store.follow(3, 1, &FollowType::Default).await.unwrap();

    let removed = store.delete_all_for_user(7).await.unwrap();

    assert_eq!(removed, 4);
    for follow_type in [
        FollowType::Default,
        FollowType::Blogs,
        FollowType::Custom("groups".to_string()),
    ] {
        let counts = store.get_counts(7, &follow_type).await.unwrap();
        assert_eq!((counts.followers, counts.following), (0, 0));
    }
    // Unrelated rows survive
    assert!(store.is_following(3, 1, &FollowType::Default).await.unwrap());
}

#[tokio::test]
async fn delete_all_rolls_back_on_mid_operation_failure() {
    let (store, repo) = store();
    store.follow(7, 1, &FollowType::Default).await.unwrap();
    store.follow(2, 7, &FollowType::Blogs).await.unwrap();

    repo.inject_fault(FaultPoint::DeleteAllMidway);
    let err = store.delete_all_for_user(7).await.unwrap_err();

    assert!(matches!(err, FollowError::StorageUnavailable(_)));
    assert_eq!(repo.len(), 2);
    assert!(store.is_following(7, 1, &FollowType::Default).await.unwrap());
    assert!(store.is_following(2, 7, &FollowType::Blogs).await.unwrap());

    // A retry completes the removal
    assert_eq!(store.delete_all_for_user(7).await.unwrap(), 2);
    assert!(repo.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_follows_store_one_relationship() {
    let (store, repo) = store();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.follow(42, 7, &FollowType::Blogs).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(repo.len(), 1);
}

#[tokio::test]
async fn events_fire_only_after_successful_writes() {
    let (mut store, _) = store();
    let seen = recorder(&mut store);

    store.follow(42, 7, &FollowType::Blogs).await.unwrap();
    store.follow(42, 7, &FollowType::Blogs).await.unwrap();
    store.unfollow(42, 7, &FollowType::Blogs).await.unwrap();
    store.unfollow(42, 7, &FollowType::Blogs).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    match (&seen[0], &seen[1]) {
        (FollowEvent::Started(started), FollowEvent::Stopped(stopped)) => {
            assert_eq!(
                (started.leader_id, started.follower_id, &started.follow_type),
                (42, 7, &FollowType::Blogs)
            );
            assert_eq!(stopped.created_at, started.created_at);
        }
        other => panic!("unexpected events: {:?}", other),
    }
}

#[tokio::test]
async fn failing_observer_does_not_undo_the_follow() {
    let (mut store, _) = store();
    store.subscribe(Arc::new(|_: &FollowEvent| -> anyhow::Result<()> {
        anyhow::bail!("notification queue full")
    }));
    let seen = recorder(&mut store);

    assert!(store.follow(42, 7, &FollowType::Blogs).await.unwrap());

    assert!(store.is_following(42, 7, &FollowType::Blogs).await.unwrap());
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn storage_failure_is_distinct_and_emits_nothing() {
    let (mut store, repo) = store();
    let seen = recorder(&mut store);

    repo.inject_fault(FaultPoint::NextQuery);
    let err = store.follow(42, 7, &FollowType::Blogs).await.unwrap_err();

    assert!(matches!(err, FollowError::StorageUnavailable(_)));
    assert!(seen.lock().unwrap().is_empty());
    assert!(!store.is_following(42, 7, &FollowType::Blogs).await.unwrap());
}

#[tokio::test]
async fn delete_all_brackets_removal_with_events() {
    let (mut store, _) = store();
    store.follow(7, 1, &FollowType::Default).await.unwrap();
    let seen = recorder(&mut store);

    store.delete_all_for_user(7).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            FollowEvent::RemovingUserData { user_id: 7 },
            FollowEvent::UserDataRemoved {
                user_id: 7,
                removed: 1
            },
        ]
    );
}
