use std::{env, fs, path::PathBuf};

use ts_rs::{Config, TS};

fn generate_types_content() -> String {
    let cfg = Config::default();
    let decls: Vec<String> = vec![
        utils::response::ApiResponse::<(), ()>::decl(&cfg),
        db::models::game::GameStatus::decl(&cfg),
        db::models::game::GameFormat::decl(&cfg),
        db::models::game::CompletionStatus::decl(&cfg),
        db::models::game::Game::decl(&cfg),
        db::models::game::CreateGame::decl(&cfg),
        db::models::game::UpdateGame::decl(&cfg),
        db::models::share_profile::ShareProfile::decl(&cfg),
        db::models::share_profile::UpsertShareProfile::decl(&cfg),
        db::models::share_profile::SetShareVisibility::decl(&cfg),
        db::models::friend_list::FriendList::decl(&cfg),
        db::models::friend_list::CreateFriendList::decl(&cfg),
        db::models::friend_list::UpdateFriendList::decl(&cfg),
        services::services::storage::StoreBackend::decl(&cfg),
        services::services::collection::AddFromCatalog::decl(&cfg),
        services::services::collection::CollectionStats::decl(&cfg),
        services::services::sharing::SharedGame::decl(&cfg),
        services::services::sharing::SharedCollection::decl(&cfg),
        services::services::friends::FollowedProfile::decl(&cfg),
        services::services::friends::Follower::decl(&cfg),
        services::services::trending::TrendingGame::decl(&cfg),
        services::services::achievements::AchievementMetric::decl(&cfg),
        services::services::achievements::AchievementProgress::decl(&cfg),
        services::services::thegamesdb::Allowance::decl(&cfg),
        services::services::thegamesdb::CatalogGame::decl(&cfg),
        services::services::thegamesdb::CatalogSearchPage::decl(&cfg),
        server::routes::health::HealthStatus::decl(&cfg),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                d
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `cargo run --bin generate_types`. Do not edit it by hand.\n\n{body}\n"
    )
}

fn main() {
    let shared = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    let check_mode = env::args().any(|arg| arg == "--check");
    let content = generate_types_content();
    let path = shared.join("types.ts");

    if check_mode {
        let current = fs::read_to_string(&path).unwrap_or_default();
        if current == content {
            println!("shared/types.ts is up to date.");
            std::process::exit(0);
        }
        eprintln!("shared/types.ts is stale. Run `cargo run --bin generate_types`.");
        std::process::exit(1);
    }

    if let Err(e) = fs::create_dir_all(&shared).and_then(|_| fs::write(&path, content)) {
        eprintln!("failed to write {}: {e}", path.display());
        std::process::exit(1);
    }
    println!("Wrote {}", path.display());
}
