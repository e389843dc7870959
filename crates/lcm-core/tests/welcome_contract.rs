//! Contract: first-start setup runs once per user
//!
//! However many processes start together, exactly one performs the setup,
//! and it leaves an evaluation license behind when none was stored.

mod common;

use common::{Machine, day};
use lcm_core::licensing::WelcomeConfiguration;
use lcm_core::{LicenseType, LicensingConfiguration, WelcomeService};
use tokio_test::assert_ok;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_starts_run_setup_once() {
    let machine = Machine::new(day(0));

    let starts: Vec<_> = (0..6)
        .map(|_| {
            let service = WelcomeService::new(machine.process());
            tokio::spawn(async move { service.execute_first_start_setup().await })
        })
        .collect();

    let mut performed = 0;
    for start in starts {
        if start.await.unwrap().unwrap() {
            performed += 1;
        }
    }
    assert_eq!(performed, 1);

    let welcome = machine.store().get::<WelcomeConfiguration>().await;
    assert!(!welcome.is_first_start);
    assert_eq!(welcome.first_start_time, Some(day(0)));

    let licensing = machine.store().get::<LicensingConfiguration>().await;
    assert_eq!(licensing.licenses.len(), 1);
    assert_eq!(
        licensing.current.map(|data| data.license_type),
        Some(LicenseType::Evaluation)
    );
}

#[tokio::test]
async fn test_setup_keeps_existing_license() {
    let machine = Machine::new(day(0));
    let engine = machine.process();
    engine.try_register_license(LicenseType::Essentials).await;

    assert!(
        WelcomeService::new(engine)
            .execute_first_start_setup()
            .await
            .unwrap()
    );

    let licensing = machine.store().get::<LicensingConfiguration>().await;
    assert_eq!(
        licensing.current.map(|data| data.license_type),
        Some(LicenseType::Essentials)
    );
    assert_eq!(licensing.last_evaluation_start_date, None);
}

#[tokio::test]
async fn test_setup_is_not_repeated_later() {
    let machine = Machine::new(day(0));
    let service = WelcomeService::new(machine.process());
    assert!(assert_ok!(service.execute_first_start_setup().await));

    machine.clock.set(day(300));
    assert_ok!(machine.process().remove_license().await);

    assert!(
        !WelcomeService::new(machine.process())
            .execute_first_start_setup()
            .await
            .unwrap()
    );
    let licensing = machine.store().get::<LicensingConfiguration>().await;
    assert!(licensing.current.is_none());
}
