//! Workflow template registry and composition.
//!
//! Four WAN 2.2 image-to-video templates are embedded at compile time,
//! one per supported LoRA-pair count. Each job parses a fresh copy of
//! the selected template and injects its parameters into the bound
//! nodes; the embedded text is never mutated.
//!
//! The node-id wiring is an explicit contract with the template files,
//! captured in [`NodeBindings`] and validated at load so a drifted
//! template fails fast with a clear error instead of a raw lookup
//! failure deep inside injection.

use serde_json::Value;

use crate::error::CoreError;
use crate::job::JobRequest;

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Maximum number of LoRA pairs any template wires.
pub const MAX_LORA_PAIRS: usize = 3;

const TEMPLATE_NOLORA: &str = include_str!("../templates/wan22_nolora.json");
const TEMPLATE_1LORA: &str = include_str!("../templates/wan22_1lora.json");
const TEMPLATE_2LORA: &str = include_str!("../templates/wan22_2lora.json");
const TEMPLATE_3LORA: &str = include_str!("../templates/wan22_3lora.json");

// ---------------------------------------------------------------------------
// Node bindings
// ---------------------------------------------------------------------------

/// Mapping from semantic job field to template node-id.
///
/// All fields except `steps` / `low_steps` are required to exist in the
/// template; the step nodes are an optional feature and are applied
/// only when present.
#[derive(Debug)]
pub struct NodeBindings {
    /// `LoadImage` node; input `image`.
    pub image: &'static str,
    /// Frame-count primitive; input `value`.
    pub length: &'static str,
    /// Positive-prompt primitive; input `value`.
    pub prompt: &'static str,
    /// Noise node; input `noise_seed`.
    pub seed: &'static str,
    /// Guider node; input `cfg`.
    pub cfg: &'static str,
    /// Width primitive; input `value`.
    pub width: &'static str,
    /// Height primitive; input `value`.
    pub height: &'static str,
    /// Scheduler node; input `steps`. Optional in templates.
    pub steps: &'static str,
    /// Sigma-split node; input `step`. Optional in templates.
    pub low_steps: &'static str,
    /// High-noise LoRA loader node per pair slot.
    pub lora_high: &'static [&'static str],
    /// Low-noise LoRA loader node per pair slot.
    pub lora_low: &'static [&'static str],
}

/// Wiring shared by the whole wan22 template family. Slot nodes beyond
/// a template's LoRA count simply don't exist in that template, which
/// the injection path tolerates; `active_pairs` bounds how many slots
/// are attempted.
static BINDINGS: NodeBindings = NodeBindings {
    image: "260",
    length: "846",
    prompt: "246",
    seed: "835",
    cfg: "830",
    width: "849",
    height: "848",
    steps: "834",
    low_steps: "829",
    lora_high: &["282", "339", "340"],
    lora_low: &["286", "337", "338"],
};

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// A freshly parsed template ready for injection.
pub struct LoadedTemplate {
    /// Template identifier, used in logs.
    pub name: &'static str,
    /// The parsed node graph, owned by this job.
    pub graph: Value,
    /// Node-id wiring for this template family.
    pub bindings: &'static NodeBindings,
    /// Number of LoRA pairs that will be applied (post-clamp).
    pub active_pairs: usize,
}

/// Select and parse the template for the requested LoRA-pair count.
///
/// Counts above [`MAX_LORA_PAIRS`] are clamped with a warning; the
/// extra pairs are simply not applied. The parsed graph is validated
/// against the required node bindings before it is returned.
pub fn load_for_pairs(requested_pairs: usize) -> Result<LoadedTemplate, CoreError> {
    let active_pairs = if requested_pairs > MAX_LORA_PAIRS {
        tracing::warn!(
            requested = requested_pairs,
            max = MAX_LORA_PAIRS,
            "LoRA pair count exceeds supported maximum, clamping",
        );
        MAX_LORA_PAIRS
    } else {
        requested_pairs
    };

    let (name, text) = match active_pairs {
        0 => ("wan22_nolora", TEMPLATE_NOLORA),
        1 => ("wan22_1lora", TEMPLATE_1LORA),
        2 => ("wan22_2lora", TEMPLATE_2LORA),
        _ => ("wan22_3lora", TEMPLATE_3LORA),
    };

    let graph: Value = serde_json::from_str(text)
        .map_err(|e| CoreError::Template(format!("Embedded template '{name}' is invalid: {e}")))?;

    validate_bindings(name, &graph, &BINDINGS)?;

    Ok(LoadedTemplate {
        name,
        graph,
        bindings: &BINDINGS,
        active_pairs,
    })
}

/// Check that every required bound node exists in the graph.
fn validate_bindings(
    name: &str,
    graph: &Value,
    bindings: &NodeBindings,
) -> Result<(), CoreError> {
    let required = [
        (bindings.image, "image"),
        (bindings.length, "length"),
        (bindings.prompt, "prompt"),
        (bindings.seed, "seed"),
        (bindings.cfg, "cfg"),
        (bindings.width, "width"),
        (bindings.height, "height"),
    ];
    for (node_id, field) in required {
        let has_inputs = graph
            .get(node_id)
            .and_then(|n| n.get("inputs"))
            .map(Value::is_object)
            .unwrap_or(false);
        if !has_inputs {
            return Err(CoreError::Template(format!(
                "Workflow template '{name}' missing expected node '{node_id}' ({field})"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Load the template for this job and inject its parameters.
///
/// `image_filename` is the bare filename the input normalizer placed in
/// the engine's input directory.
pub fn compose(request: &JobRequest, image_filename: &str) -> Result<Value, CoreError> {
    let mut template = load_for_pairs(request.lora_pairs.len())?;
    tracing::info!(template = template.name, "Composing workflow");
    inject(
        &mut template.graph,
        template.bindings,
        request,
        image_filename,
        template.active_pairs,
    )?;
    Ok(template.graph)
}

/// Inject request parameters into a loaded graph.
///
/// Separated from [`compose`] so callers (and tests) can drive a graph
/// that was loaded or modified elsewhere.
pub fn inject(
    graph: &mut Value,
    bindings: &NodeBindings,
    request: &JobRequest,
    image_filename: &str,
    active_pairs: usize,
) -> Result<(), CoreError> {
    set_input(graph, bindings.image, "image", image_filename.into())?;
    set_input(graph, bindings.length, "value", request.length.into())?;
    set_input(graph, bindings.prompt, "value", request.prompt.clone().into())?;
    set_input(graph, bindings.seed, "noise_seed", request.seed.into())?;
    set_input(graph, bindings.cfg, "cfg", request.cfg.into())?;
    set_input(graph, bindings.width, "value", request.width.into())?;
    set_input(graph, bindings.height, "value", request.height.into())?;

    // Step nodes are an optional template feature. When present, the
    // low-noise pass gets 60% of the primary step count, truncated.
    if graph.get(bindings.steps).is_some() {
        set_input(graph, bindings.steps, "steps", request.steps.into())?;
        let low_steps = request.steps * 6 / 10;
        set_input(graph, bindings.low_steps, "step", low_steps.into())?;
        tracing::info!(steps = request.steps, low_steps, "Applied step counts");
    }

    apply_lora_pairs(graph, bindings, request, active_pairs);

    Ok(())
}

/// Set one LoRA side (high or low) on a slot node if both the node and
/// a name are present. Missing node-ids or unnamed sides are skipped;
/// templates are not required to wire every slot.
fn apply_lora_side(
    graph: &mut Value,
    node_id: &str,
    name: Option<&str>,
    weight: f64,
    slot: usize,
    side: &str,
) {
    let Some(name) = name.filter(|s| !s.is_empty()) else {
        return;
    };
    if graph.get(node_id).is_none() {
        tracing::debug!(node_id, slot, side, "Template does not wire this LoRA slot");
        return;
    }
    // Node existence checked above; set_input cannot fail here.
    let _ = set_input(graph, node_id, "lora_name", name.into());
    let _ = set_input(graph, node_id, "strength_model", weight.into());
    tracing::info!(slot, side, lora = name, weight, "Applied LoRA");
}

fn apply_lora_pairs(
    graph: &mut Value,
    bindings: &NodeBindings,
    request: &JobRequest,
    active_pairs: usize,
) {
    for (i, pair) in request.lora_pairs.iter().take(active_pairs).enumerate() {
        if let Some(node_id) = bindings.lora_high.get(i) {
            apply_lora_side(graph, node_id, pair.high.as_deref(), pair.high_weight, i, "high");
        }
        if let Some(node_id) = bindings.lora_low.get(i) {
            apply_lora_side(graph, node_id, pair.low.as_deref(), pair.low_weight, i, "low");
        }
    }
}

/// Set `inputs.{field}` on a node, failing if the node is absent.
fn set_input(
    graph: &mut Value,
    node_id: &str,
    field: &str,
    value: Value,
) -> Result<(), CoreError> {
    let inputs = graph
        .get_mut(node_id)
        .and_then(|n| n.get_mut("inputs"))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| {
            CoreError::Template(format!(
                "Workflow graph missing expected node '{node_id}' ({field})"
            ))
        })?;
    inputs.insert(field.to_string(), value);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::job::LoraPair;

    fn request(pairs: Vec<LoraPair>) -> JobRequest {
        JobRequest {
            image_path: Some("/tmp/in.png".into()),
            image_base64: None,
            prompt: "a red fox running through snow".into(),
            seed: 424242,
            cfg: 3.5,
            width: 480,
            height: 832,
            length: 81,
            steps: 10,
            lora_pairs: pairs,
        }
    }

    fn pair(high: &str, low: &str) -> LoraPair {
        LoraPair {
            high: Some(high.into()),
            low: Some(low.into()),
            high_weight: 0.8,
            low_weight: 0.9,
        }
    }

    fn input<'a>(graph: &'a Value, node: &str, field: &str) -> &'a Value {
        &graph[node]["inputs"][field]
    }

    // -- Template selection --

    #[test]
    fn selects_template_by_pair_count() {
        for (count, name) in [
            (0, "wan22_nolora"),
            (1, "wan22_1lora"),
            (2, "wan22_2lora"),
            (3, "wan22_3lora"),
        ] {
            let loaded = load_for_pairs(count).unwrap();
            assert_eq!(loaded.name, name);
            assert_eq!(loaded.active_pairs, count);
        }
    }

    #[test]
    fn clamps_excess_pairs_to_max() {
        let loaded = load_for_pairs(5).unwrap();
        assert_eq!(loaded.name, "wan22_3lora");
        assert_eq!(loaded.active_pairs, 3);
    }

    #[test]
    fn each_load_returns_an_independent_copy() {
        let mut a = load_for_pairs(0).unwrap();
        set_input(&mut a.graph, "846", "value", 999.into()).unwrap();
        let b = load_for_pairs(0).unwrap();
        assert_eq!(input(&b.graph, "846", "value"), &Value::from(81));
    }

    // -- Parameter injection --

    #[test]
    fn compose_injects_all_core_parameters() {
        let graph = compose(&request(vec![]), "task_abc_input.png").unwrap();
        assert_eq!(input(&graph, "260", "image"), "task_abc_input.png");
        assert_eq!(input(&graph, "846", "value"), 81);
        assert_eq!(
            input(&graph, "246", "value"),
            "a red fox running through snow"
        );
        assert_eq!(input(&graph, "835", "noise_seed"), 424242);
        assert_eq!(input(&graph, "830", "cfg"), 3.5);
        assert_eq!(input(&graph, "849", "value"), 480);
        assert_eq!(input(&graph, "848", "value"), 832);
    }

    #[test]
    fn low_steps_is_sixty_percent_truncated() {
        let mut req = request(vec![]);
        req.steps = 10;
        let graph = compose(&req, "in.png").unwrap();
        assert_eq!(input(&graph, "834", "steps"), 10);
        assert_eq!(input(&graph, "829", "step"), 6);

        req.steps = 7;
        let graph = compose(&req, "in.png").unwrap();
        assert_eq!(input(&graph, "829", "step"), 4);
    }

    #[test]
    fn step_nodes_are_optional() {
        let mut loaded = load_for_pairs(0).unwrap();
        let obj = loaded.graph.as_object_mut().unwrap();
        obj.remove("834");
        obj.remove("829");
        let req = request(vec![]);
        inject(&mut loaded.graph, loaded.bindings, &req, "in.png", 0).unwrap();
        assert!(loaded.graph.get("834").is_none());
    }

    #[test]
    fn missing_required_node_fails_loudly() {
        let mut loaded = load_for_pairs(0).unwrap();
        loaded.graph.as_object_mut().unwrap().remove("835");
        let req = request(vec![]);
        let err = inject(&mut loaded.graph, loaded.bindings, &req, "in.png", 0).unwrap_err();
        assert_matches!(err, CoreError::Template(msg) if msg.contains("'835'"));
    }

    #[test]
    fn load_rejects_template_missing_required_node() {
        let graph: Value =
            serde_json::from_str(r#"{"1": {"class_type": "LoadImage", "inputs": {}}}"#).unwrap();
        let err = validate_bindings("test", &graph, &BINDINGS).unwrap_err();
        assert_matches!(err, CoreError::Template(msg) if msg.contains("missing expected node"));
    }

    // -- LoRA injection --

    #[test]
    fn applies_two_lora_pairs() {
        let graph = compose(
            &request(vec![pair("h1.safetensors", "l1.safetensors"), pair("h2.safetensors", "l2.safetensors")]),
            "in.png",
        )
        .unwrap();
        assert_eq!(input(&graph, "282", "lora_name"), "h1.safetensors");
        assert_eq!(input(&graph, "282", "strength_model"), 0.8);
        assert_eq!(input(&graph, "286", "lora_name"), "l1.safetensors");
        assert_eq!(input(&graph, "286", "strength_model"), 0.9);
        assert_eq!(input(&graph, "339", "lora_name"), "h2.safetensors");
        assert_eq!(input(&graph, "337", "lora_name"), "l2.safetensors");
    }

    #[test]
    fn unnamed_lora_side_is_skipped() {
        let mut p = pair("h1.safetensors", "l1.safetensors");
        p.low = None;
        let graph = compose(&request(vec![p]), "in.png").unwrap();
        assert_eq!(input(&graph, "282", "lora_name"), "h1.safetensors");
        // Low side untouched: template placeholder remains.
        assert_eq!(input(&graph, "286", "lora_name"), "");
    }

    #[test]
    fn missing_slot_node_is_skipped_silently() {
        let mut loaded = load_for_pairs(2).unwrap();
        loaded.graph.as_object_mut().unwrap().remove("339");
        let req = request(vec![pair("h1", "l1"), pair("h2", "l2")]);
        inject(&mut loaded.graph, loaded.bindings, &req, "in.png", 2).unwrap();
        // Pair 2's low side still lands even though its high node is gone.
        assert_eq!(input(&loaded.graph, "337", "lora_name"), "l2");
    }

    #[test]
    fn excess_pairs_beyond_clamp_are_ignored() {
        let pairs = (1..=5)
            .map(|i| pair(&format!("h{i}"), &format!("l{i}")))
            .collect();
        let graph = compose(&request(pairs), "in.png").unwrap();
        assert_eq!(input(&graph, "340", "lora_name"), "h3");
        // Only three slots exist; pairs 4 and 5 have nowhere to land.
        assert!(graph.get("341").is_none());
    }

    #[test]
    fn all_embedded_templates_validate() {
        for count in 0..=MAX_LORA_PAIRS {
            load_for_pairs(count).unwrap();
        }
    }
}
