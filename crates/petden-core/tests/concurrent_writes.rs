//! Two connections against one on-disk database, the way two request
//! handlers (or two CLI invocations) would share it.

use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};

use petden_core::clock::{Clock, SystemClock};
use petden_core::engine::PetState;
use petden_core::models::{Stats, User};
use petden_core::{Authenticator, Database, ManualClock, PetCatalog, PetError, PetService};

fn open_service(path: &str, retries: u32) -> PetService {
    PetService::new(
        Database::open(path).unwrap(),
        PetCatalog::bundled().unwrap(),
        Authenticator::new("integration", Duration::hours(1)),
        Arc::new(SystemClock),
        retries,
    )
}

fn temp_db() -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("petden.db").to_str().unwrap().to_string();
    (dir, path)
}

/// A clock that lets another connection write the pet every time it is read,
/// landing between the service's load and its conditional write.
struct RacingClock {
    now: DateTime<Utc>,
    rival: Mutex<Option<Rival>>,
}

struct Rival {
    db: Database,
    pet_id: i64,
    state: PetState,
    writes_left: u32,
}

impl RacingClock {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            rival: Mutex::new(None),
        }
    }

    fn arm(&self, db: Database, pet_id: i64, state: PetState, writes: u32) {
        *self.rival.lock().unwrap() = Some(Rival {
            db,
            pet_id,
            state,
            writes_left: writes,
        });
    }
}

impl Clock for RacingClock {
    fn now(&self) -> DateTime<Utc> {
        if let Some(rival) = self.rival.lock().unwrap().as_mut() {
            if rival.writes_left > 0 {
                let pet = rival.db.get_pet(rival.pet_id).unwrap().unwrap();
                assert!(rival
                    .db
                    .update_pet_if_version(rival.pet_id, pet.version, &rival.state)
                    .unwrap());
                rival.writes_left -= 1;
            }
        }
        self.now
    }
}

fn open_racing_service(path: &str, clock: Arc<RacingClock>, retries: u32) -> PetService {
    PetService::new(
        Database::open(path).unwrap(),
        PetCatalog::bundled().unwrap(),
        Authenticator::new("integration", Duration::hours(1)),
        clock,
        retries,
    )
}

#[test]
fn failed_commit_releases_the_transaction() {
    let (_dir, path) = temp_db();
    let writer = Database::open(&path).unwrap();
    writer
        .conn()
        .busy_timeout(std::time::Duration::from_millis(100))
        .unwrap();

    // A reader holding a shared lock keeps COMMIT from getting the exclusive lock.
    let reader = Database::open(&path).unwrap();
    reader.conn().execute_batch("BEGIN").unwrap();
    let seen: i64 = reader
        .conn()
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(seen, 0);

    let first = User::new(
        "ana".to_string(),
        "ana@example.com".to_string(),
        "h".to_string(),
        Utc::now(),
    );
    assert!(writer.create_user(&first).is_err());
    assert!(writer.conn().is_autocommit());

    reader.conn().execute_batch("COMMIT").unwrap();

    let second = User::new(
        "bo".to_string(),
        "bo@example.com".to_string(),
        "h".to_string(),
        Utc::now(),
    );
    writer.create_user(&second).unwrap();

    let other = Database::open(&path).unwrap();
    assert_eq!(other.user_count().unwrap(), 1);
    assert!(other.get_user_by_email("ana@example.com").unwrap().is_none());
}

#[test]
fn interact_gives_up_when_the_pet_keeps_changing() {
    let (_dir, path) = temp_db();
    let start = Utc.with_ymd_and_hms(2024, 9, 1, 6, 0, 0).unwrap();
    let clock = Arc::new(RacingClock::new(start));
    let svc = open_racing_service(&path, clock.clone(), 3);
    let uid = svc.signup("ana", "ana@example.com", "password1").unwrap().id.unwrap();
    let pet = svc.assign_pet(uid, "pet1").unwrap();
    let pet_id = pet.id.unwrap();

    let rival_state = PetState {
        stats: Stats::new(11.0, 12.0, 13.0),
        last_interaction: Some(start),
    };
    clock.arm(Database::open(&path).unwrap(), pet_id, rival_state, u32::MAX);

    let err = svc.interact(uid, "feed").unwrap_err();
    assert!(matches!(err, PetError::Contention(_)));

    let stored = Database::open(&path).unwrap().get_pet(pet_id).unwrap().unwrap();
    assert_eq!(stored.version, pet.version + 3);
    assert_eq!(stored.stats, rival_state.stats);
}

#[test]
fn stats_read_that_loses_a_race_shows_the_winner() {
    let (_dir, path) = temp_db();
    let start = Utc.with_ymd_and_hms(2024, 9, 1, 6, 0, 0).unwrap();
    let now = start + Duration::hours(4);

    let clock = Arc::new(RacingClock::new(start));
    let uid = {
        let svc = open_racing_service(&path, clock.clone(), 3);
        let uid = svc.signup("ana", "ana@example.com", "password1").unwrap().id.unwrap();
        svc.assign_pet(uid, "pet2").unwrap();
        uid
    };
    let pet = Database::open(&path).unwrap().get_pet_by_user(uid).unwrap().unwrap();
    assert_eq!(pet.last_interaction, Some(start));

    let clock = Arc::new(RacingClock::new(now));
    let winner = PetState {
        stats: Stats::new(42.0, 43.0, 44.0),
        last_interaction: Some(now),
    };
    clock.arm(Database::open(&path).unwrap(), pet.id.unwrap(), winner, 1);
    let svc = open_racing_service(&path, clock.clone(), 3);

    let view = svc.pet_stats(uid).unwrap();
    assert_eq!((view.hunger, view.happiness, view.energy), (42, 43, 44));
    assert_eq!(view.last_interaction, Some(now));

    let stored = Database::open(&path).unwrap().get_pet(pet.id.unwrap()).unwrap().unwrap();
    assert_eq!(stored.version, pet.version + 1);
    assert_eq!(stored.stats, winner.stats);
}

#[test]
fn stale_version_write_is_rejected() {
    let (_dir, path) = temp_db();
    let svc = open_service(&path, 3);
    let uid = svc.signup("ana", "ana@example.com", "password1").unwrap().id.unwrap();
    svc.assign_pet(uid, "pet1").unwrap();

    let a = Database::open(&path).unwrap();
    let b = Database::open(&path).unwrap();
    let seen_by_a = a.get_pet_by_user(uid).unwrap().unwrap();
    let seen_by_b = b.get_pet_by_user(uid).unwrap().unwrap();
    assert_eq!(seen_by_a.version, seen_by_b.version);

    let pet_id = seen_by_a.id.unwrap();
    let now = Utc::now();
    let from_a = PetState {
        stats: Stats::new(10.0, 10.0, 10.0),
        last_interaction: Some(now),
    };
    let from_b = PetState {
        stats: Stats::new(99.0, 99.0, 99.0),
        last_interaction: Some(now),
    };

    assert!(a.update_pet_if_version(pet_id, seen_by_a.version, &from_a).unwrap());
    assert!(!b.update_pet_if_version(pet_id, seen_by_b.version, &from_b).unwrap());

    let stored = b.get_pet(pet_id).unwrap().unwrap();
    assert_eq!(stored.stats, from_a.stats);
    assert_eq!(stored.version, seen_by_a.version + 1);
}

#[test]
fn concurrent_interactions_lose_no_updates() {
    const PER_THREAD: i64 = 15;

    let (_dir, path) = temp_db();
    let uid = {
        let svc = open_service(&path, 3);
        let uid = svc.signup("ana", "ana@example.com", "password1").unwrap().id.unwrap();
        svc.assign_pet(uid, "pet2").unwrap();
        uid
    };

    let handles: Vec<_> = ["care", "play"]
        .into_iter()
        .map(|action| {
            let path = path.clone();
            thread::spawn(move || {
                let svc = open_service(&path, 200);
                for _ in 0..PER_THREAD {
                    svc.interact(uid, action).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let db = Database::open(&path).unwrap();
    let pet = db.get_pet_by_user(uid).unwrap().unwrap();
    assert_eq!(pet.version, 2 * PER_THREAD);
    for v in [pet.stats.hunger, pet.stats.happiness, pet.stats.energy] {
        assert!((0.0..=100.0).contains(&v));
    }
}

#[test]
fn concurrent_assignment_creates_one_pet() {
    let (_dir, path) = temp_db();
    let uid = open_service(&path, 3)
        .signup("ana", "ana@example.com", "password1")
        .unwrap()
        .id
        .unwrap();

    let handles: Vec<_> = ["pet1", "pet2", "pet3"]
        .into_iter()
        .map(|choice| {
            let path = path.clone();
            thread::spawn(move || open_service(&path, 3).assign_pet(uid, choice))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(PetError::Conflict(_))))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(conflicts, 2);
    assert_eq!(Database::open(&path).unwrap().pet_count().unwrap(), 1);
}

#[test]
fn state_survives_reopen() {
    let (_dir, path) = temp_db();
    let start = Utc.with_ymd_and_hms(2024, 9, 1, 6, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));

    let open = |clock: Arc<ManualClock>| {
        PetService::new(
            Database::open(&path).unwrap(),
            PetCatalog::bundled().unwrap(),
            Authenticator::new("integration", Duration::hours(1)),
            clock,
            3,
        )
    };

    let uid = {
        let svc = open(clock.clone());
        let uid = svc.signup("ana", "ana@example.com", "password1").unwrap().id.unwrap();
        svc.assign_pet(uid, "pet3").unwrap();
        clock.advance(Duration::hours(10));
        svc.interact(uid, "feed").unwrap();
        uid
    };

    let svc = open(clock.clone());
    let view = svc.pet_stats(uid).unwrap();
    assert_eq!((view.hunger, view.happiness, view.energy), (80, 70, 90));
    assert_eq!(view.last_interaction, Some(start + Duration::hours(10)));

    let login = svc.login("ana@example.com", "password1").unwrap();
    assert_eq!(svc.authenticate(&login.token).unwrap(), uid);
}
