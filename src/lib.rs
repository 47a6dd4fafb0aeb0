mod capture;
mod config;
mod display;
mod pipeline;
mod recognition;
mod selection;

use std::sync::Arc;

use config::AppConfig;
use display::ResultBuffer;
use recognition::RecognitionClient;
use selection::Region;
use serde::Serialize;
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use tauri::{AppHandle, Emitter, Manager, State};
use tauri_plugin_clipboard_manager::ClipboardExt;
use tauri_plugin_store::StoreExt;
use tokio::sync::Mutex;

// Result text state
struct ResultText(Arc<Mutex<ResultBuffer>>);

// Recognition API credential, read from the environment at startup
struct Credential(String);

// Where the capture flow currently is
struct PhaseState(Arc<Mutex<Phase>>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Phase {
    Idle,
    Selecting,
    Capturing,
    Recognizing,
}

async fn set_phase(app: &AppHandle, phase: Phase) {
    let state: State<'_, PhaseState> = app.state();
    *state.0.lock().await = phase;
    if let Err(e) = app.emit("phase-changed", phase) {
        log::warn!("Failed to emit phase change: {}", e);
    }
}

fn restore_main(app: &AppHandle) {
    if let Some(window) = app.get_webview_window("main") {
        let _ = window.show();
        let _ = window.set_focus();
    }
}

fn stored_config(app: &AppHandle) -> anyhow::Result<AppConfig> {
    let store = app.store("config.json")?;

    match store.get("app_config") {
        Some(value) => Ok(serde_json::from_value(value.clone())?),
        None => {
            let default_config = AppConfig::default();
            store.set(
                "app_config".to_string(),
                serde_json::to_value(&default_config)?,
            );
            store.save()?;
            Ok(default_config)
        }
    }
}

/// Runs the capture-to-text pipeline for a selected region: pixel grab into
/// a timestamped PNG, then one recognition round-trip.
async fn recognize_region(app: &AppHandle, api_key: &str, region: Region) -> anyhow::Result<String> {
    let config = stored_config(app)?;
    let grabber = config.capture.strategy.grabber();
    let recognizer = RecognitionClient::new(
        &config.model.base_url,
        api_key,
        &config.model.model_name,
        config.model.max_tokens,
    );
    let dir = std::env::current_dir()?;

    let path = pipeline::capture_to_file(grabber, region, &dir).await?;
    set_phase(app, Phase::Recognizing).await;
    pipeline::recognize_file(&recognizer, &path).await
}

// Tauri commands

#[tauri::command]
async fn load_config(app: AppHandle) -> Result<AppConfig, String> {
    stored_config(&app).map_err(|e| e.to_string())
}

#[tauri::command]
async fn save_config(app: AppHandle, config: AppConfig) -> Result<(), String> {
    let store = app.store("config.json").map_err(|e| e.to_string())?;

    store.set(
        "app_config".to_string(),
        serde_json::to_value(&config).map_err(|e| e.to_string())?,
    );

    store.save().map_err(|e| e.to_string())?;

    Ok(())
}

#[tauri::command]
async fn start_capture(app: AppHandle) -> Result<(), String> {
    if let Some(window) = app.get_webview_window("main") {
        window.hide().map_err(|e| e.to_string())?;
    }

    if let Err(e) = selection::open_overlay(&app) {
        restore_main(&app);
        return Err(e.to_string());
    }

    set_phase(&app, Phase::Selecting).await;
    Ok(())
}

#[tauri::command]
async fn finish_selection(
    app: AppHandle,
    credential: State<'_, Credential>,
    result: State<'_, ResultText>,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
) -> Result<(), String> {
    selection::close_overlay(&app);

    let region = Region::from_points(x1, y1, x2, y2);
    if region.is_empty() {
        log::info!("Empty selection, nothing to capture");
        restore_main(&app);
        set_phase(&app, Phase::Idle).await;
        return Ok(());
    }

    set_phase(&app, Phase::Capturing).await;
    let outcome = recognize_region(&app, &credential.0, region).await;

    restore_main(&app);
    set_phase(&app, Phase::Idle).await;

    match outcome {
        Ok(text) => {
            let mut buffer = result.0.lock().await;
            buffer.set(text);
            let _ = app.emit("result-changed", buffer.text().to_string());
            Ok(())
        }
        Err(e) => {
            let message = format!("{:#}", e);
            log::error!("Capture failed: {}", message);
            let _ = app.emit("recognition-failed", message.clone());
            Err(message)
        }
    }
}

#[tauri::command]
async fn cancel_selection(app: AppHandle) -> Result<(), String> {
    selection::close_overlay(&app);
    restore_main(&app);
    set_phase(&app, Phase::Idle).await;
    Ok(())
}

#[tauri::command]
async fn capture_phase(state: State<'_, PhaseState>) -> Result<Phase, String> {
    Ok(*state.0.lock().await)
}

#[tauri::command]
async fn result_text(state: State<'_, ResultText>) -> Result<String, String> {
    let buffer = state.0.lock().await;
    Ok(buffer.text().to_string())
}

#[tauri::command]
async fn update_result(state: State<'_, ResultText>, text: String) -> Result<(), String> {
    state.0.lock().await.set(text);
    Ok(())
}

#[tauri::command]
async fn clear_result(app: AppHandle, state: State<'_, ResultText>) -> Result<(), String> {
    let mut buffer = state.0.lock().await;
    buffer.clear();
    let _ = app.emit("result-changed", buffer.text().to_string());
    Ok(())
}

/// Pushes the current result text to the system clipboard. Returns whether
/// anything was copied, so the UI can show its acknowledgment.
#[tauri::command]
async fn copy_result(app: AppHandle, state: State<'_, ResultText>) -> Result<bool, String> {
    let text = state.0.lock().await.text().to_string();
    if text.is_empty() {
        return Ok(false);
    }

    match app.clipboard().write_text(text) {
        Ok(()) => Ok(true),
        Err(e) => {
            log::warn!("Failed to copy to clipboard: {}", e);
            Err(e.to_string())
        }
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    if let Err(e) = TermLogger::init(
        LevelFilter::Info,
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    // The credential is required before any window is created.
    let api_key = match config::api_key_from_env() {
        Ok(key) => key,
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1);
        }
    };

    tauri::Builder::default()
        .setup(move |app| {
            app.manage(ResultText(Arc::new(Mutex::new(ResultBuffer::default()))));
            app.manage(Credential(api_key));
            app.manage(PhaseState(Arc::new(Mutex::new(Phase::Idle))));
            Ok(())
        })
        .plugin(tauri_plugin_clipboard_manager::init())
        .plugin(tauri_plugin_store::Builder::default().build())
        .invoke_handler(tauri::generate_handler![
            load_config,
            save_config,
            start_capture,
            finish_selection,
            cancel_selection,
            capture_phase,
            result_text,
            update_result,
            clear_result,
            copy_result,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
