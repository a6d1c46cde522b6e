// ── Policy persistence ────────────────────────────────────────────────────────

use netbroker_core::{BackgroundPolicy, UidPolicy};

use crate::*;

fn scratch_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("netbroker-it-{}", std::process::id()))
        .join(name)
}

/// Policies written by one broker are loaded by the next one using the
/// same file; clearing a policy removes it from the file.
#[tokio::test]
async fn test_uid_policy_survives_restart() {
    let path = scratch_path("uid_policy.json");
    let _ = std::fs::remove_file(&path);

    let mut config = test_config();
    config.policy.persist = true;
    config.policy.persist_path = path.clone();

    let first = start_broker(&config).await.unwrap();
    first
        .set_uid_policy(SYSTEM_UID, APP_UID, UidPolicy::ALLOW_METERED_BACKGROUND)
        .await
        .unwrap();
    first
        .set_uid_policy(SYSTEM_UID, APP_UID + 1, UidPolicy::REJECT_ALL)
        .await
        .unwrap();
    first
        .set_uid_policy(SYSTEM_UID, APP_UID + 1, UidPolicy::NONE)
        .await
        .unwrap();
    assert!(path.exists());

    let second = start_broker(&config).await.unwrap();
    assert_eq!(
        second.get_uid_policy(APP_UID).unwrap(),
        UidPolicy::ALLOW_METERED_BACKGROUND
    );
    assert_eq!(second.get_uid_policy(APP_UID + 1).unwrap(), UidPolicy::NONE);
    assert_eq!(
        second.get_uids_by_policy(UidPolicy::NONE).unwrap(),
        vec![APP_UID]
    );
    assert_eq!(
        second.get_background_policy_for_uid(APP_UID).unwrap(),
        BackgroundPolicy::Allowlisted
    );

    let _ = std::fs::remove_file(&path);
}
