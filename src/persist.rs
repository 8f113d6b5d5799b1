//! Persisted fuzzy systems
//!
//! A trained system is saved as an XML document: the dataset name, the
//! fitness value with all criterion weights and per-output thresholds,
//! the variables with their set positions, and the rules by variable and
//! set name. Loading reconstructs the system exactly, so a save → load
//! round trip preserves rule structure, positions and weights.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::info;

use crate::config::FitnessWeights;
use crate::dataset::{Dataset, Universe};
use crate::error::PersistError;
use crate::fitness::evaluator::{FitnessEvaluator, FitnessReport};
use crate::fuzzy::rule::{FuzzyRule, RulePair};
use crate::fuzzy::system::FuzzySystem;
use crate::fuzzy::variable::FuzzyVariable;

/// A system as stored on disk, with its run context
#[derive(Clone, Debug)]
pub struct PersistedSystem {
    pub dataset_name: String,
    pub fitness: f64,
    pub weights: FitnessWeights,
    pub thresholds: Vec<f64>,
    pub system: FuzzySystem,
}

impl PersistedSystem {
    /// Re-evaluate the stored system against a dataset using the stored
    /// weights and thresholds
    pub fn evaluate(&mut self, dataset: Arc<Dataset>) -> FitnessReport {
        let evaluator = FitnessEvaluator::with_weights(
            self.weights,
            self.thresholds.clone(),
            true,
            dataset,
        );
        let report = evaluator.evaluate(&mut self.system);
        info!(
            fitness = report.fitness,
            sensitivity = report.metrics.sensitivity,
            specificity = report.metrics.specificity,
            accuracy = report.metrics.accuracy,
            ppv = report.metrics.ppv,
            rmse = report.metrics.rmse,
            "evaluated persisted system"
        );
        report
    }
}

/// Save a trained system to an XML file
pub fn save_system(
    path: impl AsRef<Path>,
    system: &FuzzySystem,
    dataset_name: &str,
    fitness: f64,
    weights: &FitnessWeights,
    thresholds: &[f64],
) -> Result<(), PersistError> {
    let file = std::fs::File::create(path)?;
    let mut writer = Writer::new_with_indent(std::io::BufWriter::new(file), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    start(&mut writer, "Fuzzy_System")?;

    text_element(&mut writer, "Dataset_name", dataset_name)?;

    start(&mut writer, "Fitness")?;
    text_element(&mut writer, "Value", &fitness.to_string())?;
    for (tag, value) in weight_tags(weights) {
        text_element(&mut writer, tag, &value.to_string())?;
    }
    start(&mut writer, "Threshold")?;
    for threshold in thresholds {
        text_element(&mut writer, "Thresh", &threshold.to_string())?;
    }
    end(&mut writer, "Threshold")?;
    end(&mut writer, "Fitness")?;

    start(&mut writer, "Variables")?;
    for var in system.in_vars().iter().filter(|v| v.is_used_by_system()) {
        write_variable(&mut writer, "Variable_in", var)?;
    }
    for var in system.out_vars() {
        write_variable(&mut writer, "Variable_out", var)?;
    }
    end(&mut writer, "Variables")?;

    start(&mut writer, "Rules")?;
    for rule in system.rules().iter().filter(|r| r.nb_antecedents() > 0) {
        start(&mut writer, "Rule")?;
        for pair in rule.antecedents() {
            let var = &system.in_vars()[pair.var];
            text_element(&mut writer, "In_Var", var.name())?;
            text_element(&mut writer, "In_Set", var.set(pair.set).name())?;
        }
        for pair in rule.consequents() {
            let var = &system.out_vars()[pair.var];
            text_element(&mut writer, "Out_Var", var.name())?;
            text_element(&mut writer, "Out_Set", var.set(pair.set).name())?;
        }
        end(&mut writer, "Rule")?;
    }
    start(&mut writer, "Default_Rules")?;
    for default in system.default_rules() {
        text_element(&mut writer, "Default_Rule", &default.to_string())?;
    }
    end(&mut writer, "Default_Rules")?;
    end(&mut writer, "Rules")?;

    end(&mut writer, "Fuzzy_System")?;
    writer.into_inner().flush()?;
    Ok(())
}

/// Load a persisted system from an XML file
pub fn load_system(path: impl AsRef<Path>) -> Result<PersistedSystem, PersistError> {
    let mut reader = Reader::from_file(path.as_ref())?;
    reader.config_mut().trim_text(true);

    let mut loader = Loader::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => loader.open(name_of(&e)),
            Event::Empty(e) => {
                let name = name_of(&e);
                loader.open(name.clone());
                loader.close(&name);
            }
            Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                loader.text(&text)?;
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                loader.close(&name);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    loader.finish()
}

fn name_of(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn start<W: Write>(w: &mut Writer<W>, name: &str) -> Result<(), PersistError> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn end<W: Write>(w: &mut Writer<W>, name: &str) -> Result<(), PersistError> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<(), PersistError> {
    start(w, name)?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    end(w, name)
}

fn write_variable<W: Write>(
    w: &mut Writer<W>,
    element: &str,
    var: &FuzzyVariable,
) -> Result<(), PersistError> {
    start(w, element)?;
    text_element(w, "Name", var.name())?;
    for set in var.sets() {
        start(w, "Set")?;
        text_element(w, "Set_name", set.name())?;
        text_element(w, "Set_position", &set.position().to_string())?;
        end(w, "Set")?;
    }
    end(w, element)
}

fn weight_tags(weights: &FitnessWeights) -> [(&'static str, f64); 12] {
    [
        ("SensiW", weights.sensitivity),
        ("SpeciW", weights.specificity),
        ("AccuW", weights.accuracy),
        ("PPVW", weights.ppv),
        ("RMSEW", weights.rmse),
        ("RRSEW", weights.rrse),
        ("RAEW", weights.rae),
        ("MSEW", weights.mse),
        ("ADMW", weights.adm),
        ("MDMW", weights.mdm),
        ("SizeW", weights.size),
        ("OverLearnW", weights.over_learn),
    ]
}

/// Variable under construction during parsing
#[derive(Default)]
struct PendingVariable {
    name: String,
    sets: Vec<(String, f64)>,
    pending_set_name: String,
}

/// Rule under construction during parsing
#[derive(Default)]
struct PendingRule {
    in_vars: Vec<String>,
    in_sets: Vec<String>,
    out_vars: Vec<String>,
    out_sets: Vec<String>,
}

/// Event-driven builder for the persisted-system document
#[derive(Default)]
struct Loader {
    path: Vec<String>,
    dataset_name: String,
    fitness: f64,
    weights: FitnessWeights,
    thresholds: Vec<f64>,
    in_vars: Vec<PendingVariable>,
    out_vars: Vec<PendingVariable>,
    rules: Vec<PendingRule>,
    default_rules: Vec<usize>,
    current_var: Option<PendingVariable>,
    current_rule: Option<PendingRule>,
}

impl Loader {
    fn open(&mut self, name: String) {
        match name.as_str() {
            "Variable_in" | "Variable_out" => self.current_var = Some(PendingVariable::default()),
            "Rule" => self.current_rule = Some(PendingRule::default()),
            _ => {}
        }
        self.path.push(name);
    }

    fn close(&mut self, name: &str) {
        self.path.pop();
        match name {
            "Variable_in" => {
                if let Some(var) = self.current_var.take() {
                    self.in_vars.push(var);
                }
            }
            "Variable_out" => {
                if let Some(var) = self.current_var.take() {
                    self.out_vars.push(var);
                }
            }
            "Rule" => {
                if let Some(rule) = self.current_rule.take() {
                    self.rules.push(rule);
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) -> Result<(), PersistError> {
        let Some(element) = self.path.last() else {
            return Ok(());
        };
        let parse_f64 = |element: &'static str, text: &str| {
            text.parse::<f64>().map_err(|_| PersistError::InvalidValue {
                element,
                text: text.to_string(),
            })
        };
        match element.as_str() {
            "Dataset_name" => self.dataset_name = text.to_string(),
            "Value" => self.fitness = parse_f64("Value", text)?,
            "SensiW" => self.weights.sensitivity = parse_f64("SensiW", text)?,
            "SpeciW" => self.weights.specificity = parse_f64("SpeciW", text)?,
            "AccuW" => self.weights.accuracy = parse_f64("AccuW", text)?,
            "PPVW" => self.weights.ppv = parse_f64("PPVW", text)?,
            "RMSEW" => self.weights.rmse = parse_f64("RMSEW", text)?,
            "RRSEW" => self.weights.rrse = parse_f64("RRSEW", text)?,
            "RAEW" => self.weights.rae = parse_f64("RAEW", text)?,
            "MSEW" => self.weights.mse = parse_f64("MSEW", text)?,
            "ADMW" => self.weights.adm = parse_f64("ADMW", text)?,
            "MDMW" => self.weights.mdm = parse_f64("MDMW", text)?,
            "SizeW" => self.weights.size = parse_f64("SizeW", text)?,
            "OverLearnW" => self.weights.over_learn = parse_f64("OverLearnW", text)?,
            "Thresh" => {
                let value = parse_f64("Thresh", text)?;
                self.thresholds.push(value);
            }
            "Name" => {
                if let Some(var) = self.current_var.as_mut() {
                    var.name = text.to_string();
                }
            }
            "Set_name" => {
                if let Some(var) = self.current_var.as_mut() {
                    var.pending_set_name = text.to_string();
                }
            }
            "Set_position" => {
                if let Some(var) = self.current_var.as_mut() {
                    let position = parse_f64("Set_position", text)?;
                    let name = std::mem::take(&mut var.pending_set_name);
                    var.sets.push((name, position));
                }
            }
            "In_Var" => {
                if let Some(rule) = self.current_rule.as_mut() {
                    rule.in_vars.push(text.to_string());
                }
            }
            "In_Set" => {
                if let Some(rule) = self.current_rule.as_mut() {
                    rule.in_sets.push(text.to_string());
                }
            }
            "Out_Var" => {
                if let Some(rule) = self.current_rule.as_mut() {
                    rule.out_vars.push(text.to_string());
                }
            }
            "Out_Set" => {
                if let Some(rule) = self.current_rule.as_mut() {
                    rule.out_sets.push(text.to_string());
                }
            }
            "Default_Rule" => {
                let value = text.parse::<usize>().map_err(|_| PersistError::InvalidValue {
                    element: "Default_Rule",
                    text: text.to_string(),
                })?;
                self.default_rules.push(value);
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<PersistedSystem, PersistError> {
        if self.out_vars.is_empty() {
            return Err(PersistError::MissingElement("Variable_out"));
        }

        let build_variable = |pending: &PendingVariable, output: bool| {
            let positions: Vec<f64> = pending.sets.iter().map(|(_, p)| *p).collect();
            let universe = Universe {
                min: positions.iter().copied().fold(f64::INFINITY, f64::min),
                max: positions.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            };
            let mut var = if output {
                FuzzyVariable::new_output(pending.name.clone(), universe)
            } else {
                FuzzyVariable::new_input(pending.name.clone(), universe)
            };
            for (index, (name, position)) in pending.sets.iter().enumerate() {
                var.add_set(name.clone(), *position, index);
            }
            var
        };

        let in_vars: Vec<FuzzyVariable> =
            self.in_vars.iter().map(|v| build_variable(v, false)).collect();
        let out_vars: Vec<FuzzyVariable> =
            self.out_vars.iter().map(|v| build_variable(v, true)).collect();

        let find_pair = |vars: &[FuzzyVariable],
                         var_name: &str,
                         set_name: &str,
                         element: &'static str|
         -> Result<RulePair, PersistError> {
            let var = vars
                .iter()
                .position(|v| v.name() == var_name)
                .ok_or_else(|| PersistError::InvalidValue {
                    element,
                    text: var_name.to_string(),
                })?;
            let set = vars[var].set_index_by_name(set_name).ok_or_else(|| {
                PersistError::InvalidValue {
                    element,
                    text: set_name.to_string(),
                }
            })?;
            Ok(RulePair { var, set })
        };

        let mut rules = Vec::with_capacity(self.rules.len());
        for pending in &self.rules {
            let mut antecedents = Vec::with_capacity(pending.in_vars.len());
            for (var_name, set_name) in pending.in_vars.iter().zip(&pending.in_sets) {
                antecedents.push(find_pair(&in_vars, var_name, set_name, "In_Var")?);
            }
            let mut consequents = Vec::with_capacity(pending.out_vars.len());
            for (var_name, set_name) in pending.out_vars.iter().zip(&pending.out_sets) {
                consequents.push(find_pair(&out_vars, var_name, set_name, "Out_Var")?);
            }
            rules.push(FuzzyRule::new(antecedents, consequents));
        }

        // Clamp out-of-range default sets, as the decoder does
        let default_rules: Vec<usize> = self
            .default_rules
            .iter()
            .enumerate()
            .map(|(i, &set)| {
                if i < out_vars.len() && set < out_vars[i].nb_sets() {
                    set
                } else {
                    0
                }
            })
            .collect();
        if default_rules.len() != out_vars.len() {
            return Err(PersistError::MissingElement("Default_Rule"));
        }

        Ok(PersistedSystem {
            dataset_name: self.dataset_name,
            fitness: self.fitness,
            weights: self.weights,
            thresholds: self.thresholds,
            system: FuzzySystem::new(in_vars, out_vars, rules, default_rules),
        })
    }
}
