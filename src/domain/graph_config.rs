//! Builds a graph and its rules from INI configuration.
//!
//! Sections:
//! - `[graph]`: `name`, `activation` (`lazy` | `eager`)
//! - `[base.NAME]`: `symbol`, `timeframe` (default `1d`)
//! - `[node.NAME]`: `input` + `indicator` (optional `outputs` list binds
//!   one extra node per output as `NAME.output`), or `left` + `right` + `op`
//! - `[signal.NAME]`: `id`, `name`, `series`, `trigger`, `threshold`
//! - `[group.NAME]`: `id`, `name`, `conditions`, `mode`, `window_bars` or
//!   `window_secs`
//! - `[action.NAME]`: `signal`, `action`
//!
//! Section and key names are case-insensitive, so node names are too.
//! Nodes may reference each other in any order.

use crate::domain::builder::GraphBuilder;
use crate::domain::dispatch::TradeAction;
use crate::domain::error::{IndigraphError, ParseError};
use crate::domain::graph::{BinaryOp, Graph, Handle, NamedKey, Node, SeriesKey};
use crate::domain::group_signal::{Aggregation, DebounceWindow, GroupSignalRule, SignalCondition};
use crate::domain::incremental::ActivationMode;
use crate::domain::signal::{SignalId, SignalRule, TriggerKind};
use crate::domain::spec_parser::{self, ParsedCondition};
use crate::ports::config_port::ConfigPort;
use chrono::TimeDelta;
use std::collections::HashSet;

/// Auto-action binding as configured; the adapter is attached by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBinding {
    pub signal_id: SignalId,
    pub action: TradeAction,
}

#[derive(Debug)]
pub struct GraphConfig {
    pub name: String,
    pub activation: ActivationMode,
    pub graph: Graph,
    pub signals: Vec<SignalRule>,
    pub groups: Vec<GroupSignalRule>,
    pub actions: Vec<ActionBinding>,
}

fn missing(section: &str, key: &str) -> IndigraphError {
    IndigraphError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> IndigraphError {
    IndigraphError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, IndigraphError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(missing(section, key)),
    }
}

fn required_number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, IndigraphError> {
    let raw = required(config, section, key)?;
    raw.parse::<f64>()
        .map_err(|_| invalid(section, key, format!("expected a number, got '{}'", raw)))
}

/// `name` or `name.output`, lowercased to match section names.
pub fn named_key(reference: &str) -> NamedKey {
    let reference = reference.trim().to_lowercase();
    match reference.split_once('.') {
        Some((name, output)) => NamedKey::with_output(name, output),
        None => NamedKey::new(reference),
    }
}

fn sections_with_prefix(sections: &[String], prefix: &str) -> Vec<(String, String)> {
    sections
        .iter()
        .filter_map(|s| {
            s.strip_prefix(prefix)
                .filter(|name| !name.is_empty())
                .map(|name| (s.clone(), name.to_string()))
        })
        .collect()
}

pub fn load_graph_config(config: &dyn ConfigPort) -> Result<GraphConfig, IndigraphError> {
    let mut sections = config.sections();
    sections.sort();

    let name = config
        .get_string("graph", "name")
        .unwrap_or_else(|| "Unnamed".to_string());
    let activation = match config
        .get_string("graph", "activation")
        .map(|s| s.trim().to_lowercase())
        .as_deref()
    {
        None | Some("lazy") => ActivationMode::Lazy,
        Some("eager") => ActivationMode::Eager,
        Some(other) => {
            return Err(invalid(
                "graph",
                "activation",
                format!("expected lazy or eager, got '{}'", other),
            ));
        }
    };

    let graph = build_graph(config, &sections)?;
    let signals = build_signals(config, &sections, &graph)?;
    let groups = build_groups(config, &sections, &graph)?;

    let mut ids: HashSet<&SignalId> = HashSet::new();
    for id in signals.iter().map(|s| &s.id).chain(groups.iter().map(|g| &g.id)) {
        if !ids.insert(id) {
            return Err(IndigraphError::RuleInvalid {
                reason: format!("duplicate signal id '{}'", id),
            });
        }
    }

    let actions = build_actions(config, &sections, &ids)?;

    log::debug!(
        "loaded graph '{}': {} node(s), {} signal(s), {} group(s), {} action(s)",
        name,
        graph.len(),
        signals.len(),
        groups.len(),
        actions.len()
    );

    Ok(GraphConfig {
        name,
        activation,
        graph,
        signals,
        groups,
        actions,
    })
}

fn bind(builder: &mut GraphBuilder, section: &str, key: NamedKey, handle: Handle) -> Result<(), IndigraphError> {
    if builder.resolve_name(&key).is_ok() {
        return Err(invalid(section, "name", format!("'{}' is defined twice", key)));
    }
    builder.bind_name(key, handle)?;
    Ok(())
}

fn build_graph(config: &dyn ConfigPort, sections: &[String]) -> Result<Graph, IndigraphError> {
    let mut builder = GraphBuilder::new();

    for (section, name) in sections_with_prefix(sections, "base.") {
        let symbol = required(config, &section, "symbol")?;
        let timeframe = config
            .get_string(&section, "timeframe")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "1d".to_string());
        let handle = builder.allocate_base(SeriesKey::new(symbol, timeframe));
        bind(&mut builder, &section, NamedKey::new(name), handle)?;
    }

    // Reserve every node first so definitions can refer forward.
    let nodes = sections_with_prefix(sections, "node.");
    let mut reserved = Vec::with_capacity(nodes.len());
    for (section, name) in &nodes {
        let handle = builder.reserve();
        bind(&mut builder, section, NamedKey::new(name.clone()), handle)?;
        let mut outputs = Vec::new();
        if let Some(list) = config.get_string(section, "outputs") {
            for output in list.split(',').map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
                let extra = builder.reserve();
                bind(&mut builder, section, NamedKey::with_output(name.clone(), output.clone()), extra)?;
                outputs.push((output, extra));
            }
        }
        reserved.push((section.clone(), handle, outputs));
    }

    for (section, handle, outputs) in reserved {
        let resolve = |builder: &GraphBuilder, key: &str| -> Result<Handle, IndigraphError> {
            let reference = required(config, &section, key)?;
            builder
                .resolve_name(&named_key(&reference))
                .map_err(|_| invalid(&section, key, format!("unknown series '{}'", reference)))
        };

        if config.get_string(&section, "indicator").is_some() {
            let input = resolve(&builder, "input")?;
            let raw = required(config, &section, "indicator")?;
            let spec = spec_parser::parse_indicator_spec(&raw).map_err(|e| {
                invalid(&section, "indicator", format!("\n{}", e.display_with_context(&raw)))
            })?;
            for (output, extra) in outputs {
                builder.define(
                    extra,
                    Node::Indicator {
                        input,
                        spec: spec.clone().with_output(output),
                    },
                )?;
            }
            builder.define(handle, Node::Indicator { input, spec })?;
        } else if config.get_string(&section, "left").is_some() {
            if !outputs.is_empty() {
                return Err(invalid(&section, "outputs", "only indicator nodes have outputs"));
            }
            let left = resolve(&builder, "left")?;
            let right = resolve(&builder, "right")?;
            let raw = required(config, &section, "op")?;
            let op = BinaryOp::parse(&raw).ok_or_else(|| {
                invalid(
                    &section,
                    "op",
                    format!("expected add, sub, mul, div, min or max, got '{}'", raw),
                )
            })?;
            builder.define(
                handle,
                Node::Formula {
                    left,
                    right,
                    combiner: op.into(),
                },
            )?;
        } else {
            return Err(invalid(
                &section,
                "indicator",
                "node needs either input + indicator or left + right + op",
            ));
        }
    }

    Ok(builder.build()?)
}

fn series_ref(
    graph: &Graph,
    section: &str,
    key: &str,
    series: NamedKey,
) -> Result<NamedKey, IndigraphError> {
    graph
        .resolve_name(&series)
        .map_err(|_| invalid(section, key, format!("unknown series '{}'", series)))?;
    Ok(series)
}

fn build_signals(
    config: &dyn ConfigPort,
    sections: &[String],
    graph: &Graph,
) -> Result<Vec<SignalRule>, IndigraphError> {
    let mut out = Vec::new();
    for (section, name) in sections_with_prefix(sections, "signal.") {
        let id = config.get_string(&section, "id").unwrap_or_else(|| name.clone());
        let display = config.get_string(&section, "name").unwrap_or_else(|| id.clone());
        let series = named_key(&required(config, &section, "series")?);
        let series = series_ref(graph, &section, "series", series)?;
        let raw = required(config, &section, "trigger")?;
        let trigger = TriggerKind::parse(&raw).ok_or_else(|| {
            invalid(
                &section,
                "trigger",
                format!(
                    "expected above, below, crosses_above or crosses_below, got '{}'",
                    raw
                ),
            )
        })?;
        let threshold = required_number(config, &section, "threshold")?;
        out.push(SignalRule {
            id: SignalId::new(id.trim()),
            name: display,
            series: series.into(),
            trigger,
            threshold,
        });
    }
    Ok(out)
}

pub fn parse_aggregation(raw: &str) -> Option<Aggregation> {
    let raw = raw.trim().to_lowercase();
    match raw.split_once(':') {
        None => match raw.as_str() {
            "all" => Some(Aggregation::All),
            "any" => Some(Aggregation::Any),
            _ => None,
        },
        Some(("at_least", k)) => k.trim().parse::<usize>().ok().map(Aggregation::AtLeast),
        Some(("percent", p)) => p
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p >= 0.0)
            .map(Aggregation::Percent),
        Some(_) => None,
    }
}

fn parse_window(config: &dyn ConfigPort, section: &str) -> Result<DebounceWindow, IndigraphError> {
    let bars = config.get_string(section, "window_bars");
    let secs = config.get_string(section, "window_secs");
    match (bars, secs) {
        (Some(_), Some(_)) => Err(invalid(
            section,
            "window_secs",
            "set either window_bars or window_secs, not both",
        )),
        (None, Some(raw)) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|s| *s >= 0)
            .and_then(TimeDelta::try_seconds)
            .map(DebounceWindow::Duration)
            .ok_or_else(|| invalid(section, "window_secs", format!("expected whole seconds, got '{}'", raw))),
        (Some(raw), None) => raw
            .trim()
            .parse::<u32>()
            .map(DebounceWindow::Bars)
            .map_err(|_| invalid(section, "window_bars", format!("expected a bar count, got '{}'", raw))),
        (None, None) => Ok(DebounceWindow::default()),
    }
}

fn build_groups(
    config: &dyn ConfigPort,
    sections: &[String],
    graph: &Graph,
) -> Result<Vec<GroupSignalRule>, IndigraphError> {
    let mut out = Vec::new();
    for (section, name) in sections_with_prefix(sections, "group.") {
        let id = config.get_string(&section, "id").unwrap_or_else(|| name.clone());
        let display = config.get_string(&section, "name").unwrap_or_else(|| id.clone());

        let raw = required(config, &section, "conditions")?;
        let parsed: Vec<ParsedCondition> = spec_parser::parse_conditions(&raw).map_err(|e: ParseError| {
            log::error!("[{}] conditions:\n{}", section, e.display_with_context(&raw));
            IndigraphError::RuleParse(e)
        })?;
        let mut conditions = Vec::with_capacity(parsed.len());
        for c in parsed {
            let series = named_key(&c.series.to_string());
            let series = series_ref(graph, &section, "conditions", series)?;
            conditions.push(SignalCondition {
                series: series.into(),
                trigger: c.trigger,
                threshold: c.threshold,
            });
        }

        let aggregation = match config.get_string(&section, "mode") {
            None => Aggregation::All,
            Some(raw) => parse_aggregation(&raw).ok_or_else(|| {
                invalid(
                    &section,
                    "mode",
                    format!("expected all, any, at_least:K or percent:P, got '{}'", raw),
                )
            })?,
        };
        let window = parse_window(config, &section)?;

        out.push(GroupSignalRule {
            id: SignalId::new(id.trim()),
            name: display,
            conditions,
            aggregation,
            window,
        });
    }
    Ok(out)
}

fn build_actions(
    config: &dyn ConfigPort,
    sections: &[String],
    known: &HashSet<&SignalId>,
) -> Result<Vec<ActionBinding>, IndigraphError> {
    let mut out = Vec::new();
    for (section, _) in sections_with_prefix(sections, "action.") {
        let signal_id = SignalId::new(required(config, &section, "signal")?);
        if !known.contains(&signal_id) {
            return Err(IndigraphError::RuleInvalid {
                reason: format!("[{}] refers to unknown signal '{}'", section, signal_id),
            });
        }
        let raw = required(config, &section, "action")?;
        let action = TradeAction::parse(&raw).ok_or_else(|| {
            invalid(
                &section,
                "action",
                format!(
                    "expected market_buy, market_sell or close_position, got '{}'",
                    raw
                ),
            )
        })?;
        out.push(ActionBinding { signal_id, action });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::error::GraphError;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const FULL: &str = r#"
[graph]
name = Demo
activation = eager

[base.close]
symbol = BHP
timeframe = 1d

[node.spread]
left = fast
right = slow
op = sub

[node.slow]
input = fast
indicator = SMA(2)

[node.fast]
input = close
indicator = SMA(2)

[node.bb]
input = close
indicator = BOLLINGER(3, 2)
outputs = upper, lower

[signal.fast_high]
id = fast-high
name = Fast above 70
series = fast
trigger = above
threshold = 70

[group.both]
id = both
name = Both hot
conditions = fast above 70, bb.upper crosses_above 80
mode = at_least:1
window_bars = 3

[action.buy]
signal = fast-high
action = market_buy
"#;

    #[test]
    fn full_config_loads() {
        let cfg = load_graph_config(&make_config(FULL)).unwrap();
        assert_eq!(cfg.name, "Demo");
        assert_eq!(cfg.activation, ActivationMode::Eager);
        // close, spread, slow, fast, bb, bb.upper, bb.lower
        assert_eq!(cfg.graph.len(), 7);

        let spread = cfg.graph.resolve_name(&NamedKey::new("spread")).unwrap();
        let fast = cfg.graph.resolve_name(&NamedKey::new("fast")).unwrap();
        let slow = cfg.graph.resolve_name(&NamedKey::new("slow")).unwrap();
        let order = cfg.graph.topological_order(&cfg.graph.handles().collect::<Vec<_>>()).unwrap();
        let pos = |h| order.iter().position(|x| *x == h).unwrap();
        assert!(pos(fast) < pos(slow));
        assert!(pos(slow) < pos(spread));

        let upper = cfg
            .graph
            .resolve_name(&NamedKey::with_output("bb", "upper"))
            .unwrap();
        match cfg.graph.node(upper).unwrap() {
            Node::Indicator { spec, .. } => assert_eq!(spec.to_string(), "BOLLINGER(3,2).upper"),
            other => panic!("unexpected node {other}"),
        }

        assert_eq!(cfg.signals.len(), 1);
        assert_eq!(cfg.signals[0].id, SignalId::new("fast-high"));
        assert_eq!(cfg.signals[0].trigger, TriggerKind::Above);

        assert_eq!(cfg.groups.len(), 1);
        assert_eq!(cfg.groups[0].aggregation, Aggregation::AtLeast(1));
        assert_eq!(cfg.groups[0].window, DebounceWindow::Bars(3));
        assert_eq!(cfg.groups[0].conditions.len(), 2);

        assert_eq!(
            cfg.actions,
            vec![ActionBinding {
                signal_id: SignalId::new("fast-high"),
                action: TradeAction::MarketBuy,
            }]
        );
    }

    #[test]
    fn defaults_apply() {
        let cfg = load_graph_config(&make_config("[base.close]\nsymbol = BHP\n")).unwrap();
        assert_eq!(cfg.name, "Unnamed");
        assert_eq!(cfg.activation, ActivationMode::Lazy);
        assert_eq!(
            cfg.graph.base(&SeriesKey::new("BHP", "1d")),
            Some(cfg.graph.resolve_name(&NamedKey::new("close")).unwrap())
        );
    }

    #[test]
    fn missing_symbol_fails() {
        let err = load_graph_config(&make_config("[base.close]\ntimeframe = 1d\n")).unwrap_err();
        assert!(matches!(err, IndigraphError::ConfigMissing { key, .. } if key == "symbol"));
    }

    #[test]
    fn unknown_input_fails() {
        let err = load_graph_config(&make_config(
            "[base.close]\nsymbol = BHP\n[node.fast]\ninput = open\nindicator = SMA(2)\n",
        ))
        .unwrap_err();
        assert!(matches!(err, IndigraphError::ConfigInvalid { key, .. } if key == "input"));
    }

    #[test]
    fn bad_indicator_spec_fails() {
        let err = load_graph_config(&make_config(
            "[base.close]\nsymbol = BHP\n[node.fast]\ninput = close\nindicator = SMA(2\n",
        ))
        .unwrap_err();
        assert!(matches!(err, IndigraphError::ConfigInvalid { key, .. } if key == "indicator"));
    }

    #[test]
    fn bad_op_fails() {
        let err = load_graph_config(&make_config(
            "[base.close]\nsymbol = BHP\n[node.x]\nleft = close\nright = close\nop = pow\n",
        ))
        .unwrap_err();
        assert!(matches!(err, IndigraphError::ConfigInvalid { key, .. } if key == "op"));
    }

    #[test]
    fn cyclic_nodes_load_but_fail_to_order() {
        let cfg = load_graph_config(&make_config(
            "[base.close]\nsymbol = BHP\n\
             [node.a]\ninput = b\nindicator = SMA(2)\n\
             [node.b]\nleft = a\nright = close\nop = add\n",
        ))
        .unwrap();
        let all: Vec<Handle> = cfg.graph.handles().collect();
        let err = cfg.graph.topological_order(&all).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
    }

    #[test]
    fn duplicate_name_fails() {
        let err = load_graph_config(&make_config(
            "[base.fast]\nsymbol = BHP\n[node.fast]\ninput = fast\nindicator = SMA(2)\n",
        ))
        .unwrap_err();
        assert!(matches!(err, IndigraphError::ConfigInvalid { key, .. } if key == "name"));
    }

    #[test]
    fn signal_on_unknown_series_fails() {
        let err = load_graph_config(&make_config(
            "[base.close]\nsymbol = BHP\n[signal.s]\nseries = fast\ntrigger = above\nthreshold = 1\n",
        ))
        .unwrap_err();
        assert!(matches!(err, IndigraphError::ConfigInvalid { key, .. } if key == "series"));
    }

    #[test]
    fn signal_defaults_id_to_section_name() {
        let cfg = load_graph_config(&make_config(
            "[base.close]\nsymbol = BHP\n[signal.low]\nseries = close\ntrigger = crosses_below\nthreshold = 10.5\n",
        ))
        .unwrap();
        assert_eq!(cfg.signals[0].id, SignalId::new("low"));
        assert_eq!(cfg.signals[0].name, "low");
        assert_eq!(cfg.signals[0].threshold, 10.5);
    }

    #[test]
    fn bad_threshold_fails() {
        let err = load_graph_config(&make_config(
            "[base.close]\nsymbol = BHP\n[signal.s]\nseries = close\ntrigger = above\nthreshold = high\n",
        ))
        .unwrap_err();
        assert!(matches!(err, IndigraphError::ConfigInvalid { key, .. } if key == "threshold"));
    }

    #[test]
    fn bad_conditions_are_rule_parse_errors() {
        let err = load_graph_config(&make_config(
            "[base.close]\nsymbol = BHP\n[group.g]\nconditions = close sideways 3\n",
        ))
        .unwrap_err();
        assert!(matches!(err, IndigraphError::RuleParse(_)));
    }

    #[test]
    fn window_secs_builds_duration() {
        let cfg = load_graph_config(&make_config(
            "[base.close]\nsymbol = BHP\n[group.g]\nconditions = close above 3\nmode = percent:50\nwindow_secs = 90\n",
        ))
        .unwrap();
        assert_eq!(cfg.groups[0].aggregation, Aggregation::Percent(50.0));
        assert_eq!(cfg.groups[0].window, DebounceWindow::Duration(TimeDelta::seconds(90)));
    }

    #[test]
    fn both_windows_fail() {
        let err = load_graph_config(&make_config(
            "[base.close]\nsymbol = BHP\n[group.g]\nconditions = close above 3\nwindow_bars = 2\nwindow_secs = 90\n",
        ))
        .unwrap_err();
        assert!(matches!(err, IndigraphError::ConfigInvalid { key, .. } if key == "window_secs"));
    }

    #[test]
    fn non_numeric_windows_fail() {
        for (key, raw) in [("window_bars", "three"), ("window_bars", "-1"), ("window_secs", "1.5")] {
            let err = load_graph_config(&make_config(&format!(
                "[base.close]\nsymbol = BHP\n[group.g]\nconditions = close above 3\n{} = {}\n",
                key, raw
            )))
            .unwrap_err();
            assert!(
                matches!(&err, IndigraphError::ConfigInvalid { key: k, .. } if k == key),
                "{key} = {raw}: {err}"
            );
        }
    }

    #[test]
    fn duplicate_signal_ids_fail() {
        let err = load_graph_config(&make_config(
            "[base.close]\nsymbol = BHP\n\
             [signal.a]\nid = x\nseries = close\ntrigger = above\nthreshold = 1\n\
             [group.b]\nid = x\nconditions = close above 3\n",
        ))
        .unwrap_err();
        assert!(matches!(err, IndigraphError::RuleInvalid { .. }));
    }

    #[test]
    fn action_for_unknown_signal_fails() {
        let err = load_graph_config(&make_config(
            "[base.close]\nsymbol = BHP\n[action.a]\nsignal = nope\naction = market_buy\n",
        ))
        .unwrap_err();
        assert!(matches!(err, IndigraphError::RuleInvalid { .. }));
    }

    #[test]
    fn aggregation_parsing() {
        assert_eq!(parse_aggregation("ALL"), Some(Aggregation::All));
        assert_eq!(parse_aggregation("any"), Some(Aggregation::Any));
        assert_eq!(parse_aggregation("at_least:2"), Some(Aggregation::AtLeast(2)));
        assert_eq!(parse_aggregation("percent: 75"), Some(Aggregation::Percent(75.0)));
        assert_eq!(parse_aggregation("percent:-5"), None);
        assert_eq!(parse_aggregation("most"), None);
    }
}
