//! Card documents shared by unit tests

use serde_json::{json, Value};

/// A complete card that validates and resolves without any diagnostics
pub fn card(name: &str, version: &str) -> Value {
    json!({
        "abc_version": "0.1",
        "identity": {
            "name": name,
            "display_name": "Inventory Rebalance Optimizer",
            "version": version,
            "authors": ["Ops Research Team"],
            "created": "2024-03-01",
            "license": "MIT",
            "tags": ["inventory", "optimization"]
        },
        "problem_pattern": {
            "category": "constrained-resource-allocation",
            "description": "Allocate scarce stock across locations to meet forecast demand under transfer limits",
            "sub_patterns": ["multi-location-balancing"],
            "analogous_domains": [
                {"domain": "humanitarian-logistics", "similarity": 0.8, "notes": "Relief supplies instead of retail stock"}
            ]
        },
        "behavior": {
            "trigger": {"type": "scheduled", "schedule": "daily"},
            "inputs": [
                {"name": "stock_levels", "type": "table", "description": "Current stock per location"}
            ],
            "outputs": [
                {"name": "transfer_plan", "type": "list", "description": "Recommended transfers"}
            ],
            "reasoning": {
                "method": "linear-programming",
                "objectives": [
                    {"name": "minimize stockouts", "weight": 0.6},
                    {"name": "minimize transfer cost", "weight": 0.4}
                ]
            }
        },
        "domain_assumptions": {
            "data_assumptions": [
                {
                    "id": "DA-001",
                    "assumption": "Daily stock counts are accurate",
                    "strength": "hard",
                    "adaptation_note": "Add a reconciliation step when counts are manual"
                }
            ],
            "environment_assumptions": [
                {"id": "EA-001", "assumption": "Transfers complete within two days", "strength": "soft"}
            ],
            "authority_assumptions": [
                {
                    "id": "AA-001",
                    "assumption": "Planner may approve transfers without sign-off",
                    "strength": "hard",
                    "adaptation_note": "Route plans through an approval queue"
                }
            ]
        },
        "adaptation_points": [
            {
                "id": "AP-001",
                "name": "Demand forecaster",
                "type": "swappable_component",
                "current": "exponential-smoothing",
                "interface": "DemandForecaster",
                "suggested_alternatives": [
                    {"name": "needs-assessment-model", "domain": "humanitarian-logistics"}
                ]
            },
            {
                "id": "AP-002",
                "name": "Service level targets",
                "type": "configurable",
                "parameters": [
                    {"name": "safety_stock_days", "range": [1, 30], "default": 7}
                ]
            }
        ],
        "composition": {
            "delegates_to": [
                {"behavior": "demand-forecaster", "interface": "DemandForecaster"}
            ],
            "emits": [
                {"event": "transfer-plan-ready", "payload": {"plan": "list"}}
            ],
            "listens_to": [
                {"event": "stock-count-updated", "source": "inventory-sync"}
            ]
        },
        "trust": {
            "failure_modes": [
                {
                    "id": "FM-001",
                    "scenario": "Forecast spike from bad data",
                    "impact": "Overstock at receiving sites",
                    "severity": "medium",
                    "mitigation": "Clamp forecast deltas"
                }
            ],
            "ethical_flags": [],
            "human_oversight": {"required": true}
        },
        "provenance": {
            "origin": {"domain": "retail-inventory", "organization": "Acme Retail"},
            "lineage": [
                {
                    "version": "1.0.0",
                    "date": "2024-03-01",
                    "notes": "Initial release",
                    "adaptation_points_changed": ["AP-001"],
                    "assumptions_changed": ["DA-001"]
                }
            ],
            "compatibility": [
                {"framework": "langgraph", "versions": ">=0.2"}
            ]
        }
    })
}

/// Replace the value at a JSON pointer
pub fn set(document: &mut Value, pointer: &str, value: Value) {
    *document
        .pointer_mut(pointer)
        .unwrap_or_else(|| panic!("no value at {}", pointer)) = value;
}

/// Remove a field addressed by a JSON pointer
pub fn remove(document: &mut Value, pointer: &str) {
    let (parent, key) = pointer.rsplit_once('/').expect("pointer has a parent");
    document
        .pointer_mut(parent)
        .and_then(Value::as_object_mut)
        .expect("parent is a mapping")
        .remove(key);
}
