//! Contract: Free/Essentials registration and license keys are idempotent
//!
//! Registering the same tier or key again never duplicates a stored
//! license, and removing a license does not reset the evaluation history.
//! Unlocked registrations racing each other may lose an update, but the
//! licensing file always stays a complete record.

mod common;

use chrono::Duration;
use common::{Machine, day};
use lcm_core::licensing::to_unsigned_key;
use lcm_core::{
    LicenseRegistrationData, LicenseType, LicensingConfiguration, Registration, Rejection,
};

async fn stored(machine: &Machine) -> LicensingConfiguration {
    machine.store().get::<LicensingConfiguration>().await
}

#[tokio::test]
async fn test_registering_a_tier_twice_stores_one_license() {
    let machine = Machine::new(day(0));
    let engine = machine.process();

    for tier in [LicenseType::Free, LicenseType::Essentials] {
        let first = engine.try_register_license(tier).await;
        assert!(matches!(first, Registration::Registered(_)), "{:?}", first);

        let second = engine.try_register_license(tier).await;
        assert!(second.is_success());
        assert!(
            matches!(&second, Registration::AlreadyRegistered(data) if data.license_type == tier),
            "{:?}",
            second
        );
    }

    let configuration = stored(&machine).await;
    assert_eq!(configuration.licenses.len(), 2);
    assert_eq!(
        configuration.current.map(|data| data.license_type),
        Some(LicenseType::Essentials)
    );
}

#[tokio::test]
async fn test_second_process_sees_first_registration() {
    let machine = Machine::new(day(0));

    let registered = machine.process().try_register_license(LicenseType::Free).await;
    let again = machine.process().try_register_license(LicenseType::Free).await;

    assert_eq!(
        again,
        Registration::AlreadyRegistered(registered.license().cloned().unwrap())
    );
    assert_eq!(stored(&machine).await.licenses.len(), 1);
}

#[tokio::test]
async fn test_remove_keeps_evaluation_history() {
    let machine = Machine::new(day(0));
    let engine = machine.process();

    assert!(engine.try_activate_license().await.unwrap().is_success());
    assert!(engine.remove_license().await.unwrap());

    let configuration = stored(&machine).await;
    assert!(configuration.current.is_none());
    assert!(configuration.licenses.is_empty());
    assert_eq!(configuration.last_evaluation_start_date, Some(day(0)));

    // Nothing left to remove
    assert!(!engine.remove_license().await.unwrap());
}

#[tokio::test]
async fn test_tier_can_be_registered_again_after_removal() {
    let machine = Machine::new(day(0));
    let engine = machine.process();

    engine.try_register_license(LicenseType::Free).await;
    engine.remove_license().await.unwrap();

    machine.clock.set(day(3));
    let registration = engine.try_register_license(LicenseType::Free).await;

    let data = match registration {
        Registration::Registered(data) => data,
        other => panic!("expected a fresh Free license, got {:?}", other),
    };
    assert_eq!(data.valid_from, day(3));
    assert_eq!(stored(&machine).await.licenses.len(), 1);
}

#[tokio::test]
async fn test_license_key_registration_is_idempotent() {
    let machine = Machine::new(day(0));
    let engine = machine.process();

    let data = LicenseRegistrationData::self_issued(
        LicenseType::Registered,
        "lcm",
        day(0),
        Some(day(0) + Duration::days(365)),
    );
    let key = to_unsigned_key(&data).unwrap();

    assert_eq!(
        engine.register_license_key(&key).await,
        Registration::Registered(data.clone())
    );
    assert_eq!(
        engine.register_license_key(&format!("  {}\n", key)).await,
        Registration::AlreadyRegistered(data.clone())
    );

    let configuration = stored(&machine).await;
    assert_eq!(configuration.licenses, vec![key]);
    assert_eq!(configuration.current, Some(data));
}

#[tokio::test]
async fn test_renewed_key_replaces_previous_one() {
    let machine = Machine::new(day(0));
    let engine = machine.process();

    let original = LicenseRegistrationData::self_issued(
        LicenseType::Registered,
        "lcm",
        day(0),
        Some(day(30)),
    );
    let renewed = LicenseRegistrationData {
        valid_to: Some(day(400)),
        subscription_end_date: Some(day(400)),
        ..original.clone()
    };

    engine
        .register_license_key(&to_unsigned_key(&original).unwrap())
        .await;
    let registration = engine
        .register_license_key(&to_unsigned_key(&renewed).unwrap())
        .await;

    assert_eq!(registration, Registration::Registered(renewed.clone()));
    let configuration = stored(&machine).await;
    assert_eq!(configuration.licenses.len(), 1);
    assert_eq!(configuration.current, Some(renewed));
}

#[tokio::test]
async fn test_malformed_key_is_rejected_without_write() {
    let machine = Machine::new(day(0));
    let engine = machine.process();

    let registration = engine.register_license_key("not-a-license").await;

    assert!(
        matches!(
            registration,
            Registration::Rejected(Rejection::InvalidLicenseKey(_))
        ),
        "{:?}",
        registration
    );
    assert!(!machine.store().file_path::<LicensingConfiguration>().exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_tier_registrations_keep_a_complete_record() {
    for _ in 0..30 {
        let machine = Machine::new(day(0));
        assert!(machine.process().try_activate_license().await.unwrap().is_success());
        machine.clock.set(day(50));

        let free = machine.process();
        let essentials = machine.process();
        let (a, b) = tokio::join!(
            tokio::spawn(async move { free.try_register_license(LicenseType::Free).await }),
            tokio::spawn(async move {
                essentials
                    .try_register_license(LicenseType::Essentials)
                    .await
            }),
        );
        assert!(matches!(a.unwrap(), Registration::Registered(_)));
        assert!(matches!(b.unwrap(), Registration::Registered(_)));

        // Last writer wins, but the file is always one writer's whole JSON
        let path = machine.store().file_path::<LicensingConfiguration>();
        let text = std::fs::read_to_string(&path).unwrap();
        let configuration: LicensingConfiguration = serde_json::from_str(&text).unwrap();

        assert_eq!(configuration.last_evaluation_start_date, Some(day(0)));
        assert!(matches!(
            configuration.current.map(|data| data.license_type),
            Some(LicenseType::Free | LicenseType::Essentials)
        ));
        assert_eq!(
            machine.process().license_status().await.evaluation_eligible_after,
            Some(day(165))
        );
    }
}
