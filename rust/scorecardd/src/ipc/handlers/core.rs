use crate::ipc::error::{bad_params, err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "subjectOrder": state.config.subject_order,
            "clampPercentage": state.config.clamp_percentage
        }),
    )
}

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match serde_json::to_value(&state.config) {
        Ok(v) => ok(&req.id, json!({ "config": v })),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

fn handle_config_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return bad_params(&req.id, "patch must be an object");
    };
    if let Err(msg) = state.config.apply_patch(patch) {
        return err(&req.id, "config_invalid", msg, None);
    }
    log::info!("engine config updated: {:?}", patch.keys().collect::<Vec<_>>());
    handle_config_get(state, req)
}

fn handle_config_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.config = Default::default();
    handle_config_get(state, req)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "engine.config.get" => Some(handle_config_get(state, req)),
        "engine.config.update" => Some(handle_config_update(state, req)),
        "engine.config.reset" => Some(handle_config_reset(state, req)),
        _ => None,
    }
}
