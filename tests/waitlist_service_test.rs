use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use oor3d::waitlist::{
    SignupRequest, SubmitOutcome, Waitlist,
    error::WaitlistError,
    service::Clock,
    store::{MemoryStore, SignupStore},
};

fn request(email: &str) -> SignupRequest {
    SignupRequest {
        email: email.to_string(),
        imvu_name: "PixelQueen".to_string(),
        discord_tag: "pixelqueen#0420".to_string(),
        motivation: "I sell furniture meshes and want faster texture swaps".to_string(),
        social_link: Some("https://example.com/pixelqueen".to_string()),
        notes: None,
    }
}

/// Clock advancing one minute per reading.
struct StepClock {
    start: DateTime<Utc>,
    ticks: AtomicUsize,
}

impl StepClock {
    fn new() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            ticks: AtomicUsize::new(0),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.start + Duration::minutes(tick as i64)
    }
}

/// Clock returning whatever the test sets.
struct ManualClock(Mutex<DateTime<Utc>>);

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

fn waitlist() -> (Waitlist, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (Waitlist::with_clock(store.clone(), Arc::new(StepClock::new())), store)
}

#[tokio::test]
async fn new_email_creates_exactly_one_record() {
    let (waitlist, store) = waitlist();

    let outcome = waitlist.submit(&request("ada@example.com")).await.unwrap();

    assert!(!outcome.is_duplicate());
    assert_eq!(store.count().await.unwrap(), 1);
    let stored = store.find_by_email("ada@example.com").await.unwrap().unwrap();
    assert_eq!(Some(stored.id), outcome.id());
    assert_eq!(stored.imvu_name, "PixelQueen");
    assert_eq!(stored.notes, None);
}

#[tokio::test]
async fn same_normalized_email_is_a_duplicate_success() {
    let (waitlist, store) = waitlist();
    waitlist.submit(&request("ada@example.com")).await.unwrap();

    let again = waitlist
        .submit(&request("  ADA@Example.COM "))
        .await
        .unwrap();

    assert_eq!(again, SubmitOutcome::AlreadyRegistered);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_does_not_overwrite_the_first_record() {
    let (waitlist, store) = waitlist();
    let first = waitlist.submit(&request("ada@example.com")).await.unwrap();

    let mut changed = request("ada@example.com");
    changed.imvu_name = "SomeoneElse".to_string();
    waitlist.submit(&changed).await.unwrap();

    let stored = store.find_by_email("ada@example.com").await.unwrap().unwrap();
    assert_eq!(Some(stored.id), first.id());
    assert_eq!(stored.imvu_name, "PixelQueen");
}

#[tokio::test]
async fn malformed_email_is_rejected_and_nothing_is_stored() {
    let (waitlist, store) = waitlist();

    let err = waitlist.submit(&request("foo@bar")).await.unwrap_err();

    match err {
        WaitlistError::Validation(errors) => {
            assert_eq!(errors.get("email"), Some("Please enter a valid email address"));
            assert_eq!(errors.len(), 1);
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_required_fields_are_reported_together() {
    let (waitlist, _) = waitlist();
    let empty = SignupRequest {
        email: "ada@example.com".to_string(),
        ..Default::default()
    };

    let Err(WaitlistError::Validation(errors)) = waitlist.submit(&empty).await else {
        panic!("expected a validation error");
    };

    let fields: Vec<_> = errors.fields().collect();
    assert_eq!(fields, vec!["discordTag", "imvuName", "motivation"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_submissions_store_one_record() {
    let (waitlist, store) = waitlist();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let waitlist = waitlist.clone();
            tokio::spawn(async move { waitlist.submit(&request("race@example.com")).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if !outcome.is_duplicate() {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn list_is_newest_first() {
    let (waitlist, _) = waitlist();
    for email in ["first@example.com", "second@example.com", "third@example.com"] {
        waitlist.submit(&request(email)).await.unwrap();
    }

    let emails: Vec<_> = waitlist
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.email)
        .collect();

    assert_eq!(
        emails,
        vec!["third@example.com", "second@example.com", "first@example.com"]
    );
}

#[tokio::test]
async fn list_orders_by_creation_time_not_insertion() {
    let store = Arc::new(MemoryStore::new());
    let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock(Mutex::new(t0)));
    let waitlist = Waitlist::with_clock(store, clock.clone());

    *clock.0.lock().unwrap() = t0 + Duration::hours(2);
    waitlist.submit(&request("late@example.com")).await.unwrap();
    *clock.0.lock().unwrap() = t0;
    waitlist.submit(&request("early@example.com")).await.unwrap();

    let list = waitlist.list().await.unwrap();
    assert_eq!(list[0].email, "late@example.com");
    assert_eq!(list[1].email, "early@example.com");
    assert!(list.windows(2).all(|w| w[0].created_at >= w[1].created_at));
}

#[tokio::test]
async fn lookup_and_count() {
    let (waitlist, _) = waitlist();
    assert_eq!(waitlist.count().await.unwrap(), 0);

    waitlist.submit(&request("ada@example.com")).await.unwrap();
    waitlist.submit(&request("grace@example.com")).await.unwrap();

    assert_eq!(waitlist.count().await.unwrap(), 2);
    assert!(waitlist.lookup(" Ada@Example.com").await.unwrap());
    assert!(!waitlist.lookup("linus@example.com").await.unwrap());
    assert!(!waitlist.lookup("not an email").await.unwrap());
}
