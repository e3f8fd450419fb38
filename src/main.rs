// ==========================================
// 同行评审系统 - 命令行入口
// ==========================================
// 用法:
//   peer-review-import submit <profile> <csv_path>
//   peer-review-import decide <staging_id> <confirm|cancel>
//   peer-review-import validate <profile> <csv_path>
//   peer-review-import expire
//   peer-review-import recent
//
// 数据库路径: PEER_REVIEW_IMPORT_DB_PATH（默认用户数据目录）
// 结果以 JSON 输出到 stdout，日志输出到 stderr
// ==========================================

use peer_review_import::api::{ApiError, ErrorPayload};
use peer_review_import::app::{get_default_db_path, AppState};
use peer_review_import::domain::ImportProfile;
use peer_review_import::{logging, validate_csv, ValidationResult};
use serde::Serialize;
use std::process::ExitCode;

const USAGE: &str = "用法:
  peer-review-import submit <profile> <csv_path>
  peer-review-import decide <staging_id> <confirm|cancel>
  peer-review-import validate <profile> <csv_path>
  peer-review-import expire
  peer-review-import recent";

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    // validate 不需要数据库
    if command == "validate" {
        return match (args.get(1), args.get(2)) {
            (Some(profile), Some(path)) => run_validate(profile, path),
            _ => usage_error(),
        };
    }

    let db_path = get_default_db_path();
    tracing::info!(
        "{} v{}, 使用数据库: {}",
        peer_review_import::APP_NAME,
        peer_review_import::VERSION,
        db_path
    );

    let state = match AppState::new(db_path).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("AppState初始化失败: {}", e);
            return print_error(&ApiError::InternalError(e));
        }
    };
    let api = &state.import_api;

    match command.as_str() {
        "submit" => {
            let (Some(profile), Some(path)) = (args.get(1), args.get(2)) else {
                return usage_error();
            };
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    return print_error(&ApiError::InvalidInput(format!(
                        "无法读取文件 {}: {}",
                        path, e
                    )))
                }
            };
            match api.submit_csv(profile, &bytes).await {
                Ok(response) => {
                    let code = if response.valid {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    };
                    print_json(&response);
                    code
                }
                Err(e) => print_error(&e),
            }
        }
        "decide" => {
            let (Some(staging_id), Some(decision)) = (args.get(1), args.get(2)) else {
                return usage_error();
            };
            respond(api.decide_csv(staging_id, decision).await)
        }
        "expire" => respond(
            api.expire_stale_imports()
                .await
                .map(|expired| serde_json::json!({ "expired": expired })),
        ),
        "recent" => respond(api.list_recent_imports().await),
        _ => usage_error(),
    }
}

fn run_validate(profile: &str, path: &str) -> ExitCode {
    let Some(profile) = ImportProfile::by_name(profile) else {
        return print_error(&ApiError::InvalidInput(format!("未知的导入配置档: {}", profile)));
    };
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            return print_error(&ApiError::InvalidInput(format!(
                "无法读取文件 {}: {}",
                path, e
            )))
        }
    };
    match validate_csv(&bytes, &profile) {
        ValidationResult::Valid(records) => {
            print_json(&serde_json::json!({ "valid": true, "count": records.len() }));
            ExitCode::SUCCESS
        }
        ValidationResult::Invalid(err) => print_error(&ApiError::from(err)),
    }
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> ExitCode {
    match result {
        Ok(value) => {
            print_json(&value);
            ExitCode::SUCCESS
        }
        Err(e) => print_error(&e),
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("结果序列化失败: {}", e),
    }
}

fn print_error(err: &ApiError) -> ExitCode {
    let payload: ErrorPayload = err.to_payload();
    print_json(&payload);
    ExitCode::FAILURE
}

fn usage_error() -> ExitCode {
    eprintln!("{}", USAGE);
    ExitCode::from(2)
}
