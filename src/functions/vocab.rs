//! `autoCV`: controlled vocabularies generated from the labels in the data

use super::{arg_text, input_text, FunctionRegistry};
use crate::graph::Term;
use crate::processor::resource::process_resource_spec;
use crate::processor::TemplateState;
use crate::spec::ResourceSpec;
use crate::template::{hash_digest, normalize, vars, MapResult, Value};
use std::sync::LazyLock;

const CV_ID: &str = "cvID";
const CV_NAME: &str = "cvName";
const CV_LABEL: &str = "cvLabel";
const CV_SCHEME: &str = "cvScheme";

static SCHEME_TEMPLATE: LazyLock<ResourceSpec> = LazyLock::new(|| {
    ResourceSpec::new(
        "autoCVscheme",
        [
            ("@id", "<{cvID}>"),
            ("@type", "<skos:ConceptScheme>"),
            ("<dct:title>", "{cvName}"),
            (
                "<dct:description>",
                "Automatically generated concept scheme {cvName}",
            ),
        ],
    )
});

static CONCEPT_TEMPLATE: LazyLock<ResourceSpec> = LazyLock::new(|| {
    ResourceSpec::new(
        "autoCVlabel",
        [
            ("@id", "<{cvID}>"),
            ("@type", "<skos:Concept>"),
            ("<skos:prefLabel>", "{cvLabel}"),
            ("<skos:inScheme>", "<{cvScheme}>"),
            ("<skos:topConceptOf>", "<{cvScheme}>"),
            ("^<skos:hasTopConcept>", "<{cvScheme}>"),
        ],
    )
});

/// `autoCV(cvName, 'hash'|'label')`
///
/// Map a label to a concept in a generated concept scheme, creating the
/// scheme and the concept the first time each is seen. Concept ids are the
/// normalized label, or its digest with `'hash'`. Without a scheme name the
/// current property name is used.
fn auto_cv(value: Value, state: &mut TemplateState<'_>, args: &[Value]) -> MapResult<Value> {
    let Some(label) = input_text(&value) else {
        return Ok(Value::Null);
    };
    let cv_name = arg_text(args, 0)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| state.lookup(vars::PROP).render());
    let use_hash = arg_text(args, 1).is_some_and(|t| t == "hash");

    if let Some(id) = state.run.vocab_entry(&cv_name, &label) {
        return Ok(id.clone().into());
    }

    let base = format!("{}/def/{}", state.dataset_base(), cv_name);
    let known_scheme = state.run.scheme(&cv_name).map(|id| id.as_str().to_string());
    let scheme_id = match known_scheme {
        Some(id) => id,
        None => {
            let scheme_id = format!("{}_scheme", base);
            let mut scheme = state.child([
                (CV_ID, Value::str(scheme_id.clone())),
                (CV_NAME, Value::str(cv_name.clone())),
            ]);
            process_resource_spec(&SCHEME_TEMPLATE.name, &SCHEME_TEMPLATE, &mut scheme)?;
            state.run.record_scheme(&cv_name, Term::iri(scheme_id.clone()));
            scheme_id
        }
    };

    let local = if use_hash {
        hash_digest([label.as_str()])
    } else {
        normalize(&label)
    };
    let concept_id = format!("{}/{}", base, local);
    let mut concept = state.child([
        (CV_ID, Value::str(concept_id.clone())),
        (CV_LABEL, Value::str(label.clone())),
        (CV_SCHEME, Value::str(scheme_id)),
    ]);
    process_resource_spec(&CONCEPT_TEMPLATE.name, &CONCEPT_TEMPLATE, &mut concept)?;

    let id = Term::iri(concept_id);
    state.run.record_vocab_entry(&cv_name, &label, id.clone());
    Ok(id.into())
}

pub(super) fn install(registry: &mut FunctionRegistry) {
    registry.register("autoCV", auto_cv);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::vocab as v;
    use crate::template::pattern_expand;

    const BASE: &str = "https://epimorphics.com/datasets/testds";
    const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";

    fn harness() -> crate::processor::testing::Harness {
        crate::processor::testing::Harness::new("globals: {$datasetID: testds}")
    }

    #[test]
    fn labels_become_concepts_in_a_scheme() {
        let mut h = harness();
        {
            let mut state = h.state([("crop", Value::str("Winter Wheat"))]);
            assert_eq!(
                pattern_expand("{crop | autoCV('crops')}", &mut state).unwrap(),
                Value::Term(Term::iri(format!("{}/def/crops/Winter_Wheat", BASE)))
            );
        }
        let statements = h.statements();
        let concept = Term::iri(format!("{}/def/crops/Winter_Wheat", BASE));
        let scheme = Term::iri(format!("{}/def/crops_scheme", BASE));
        assert!(statements.iter().any(|s| s.subject == concept
            && s.predicate == Term::iri(v::RDF_TYPE)
            && s.object == Term::iri(format!("{}Concept", SKOS))));
        assert!(statements.iter().any(|s| s.subject == scheme
            && s.predicate == Term::iri(v::RDF_TYPE)
            && s.object == Term::iri(format!("{}ConceptScheme", SKOS))));
        // inverse: scheme hasTopConcept concept
        assert!(statements.iter().any(|s| s.subject == scheme
            && s.predicate == Term::iri(format!("{}hasTopConcept", SKOS))
            && s.object == concept));
    }

    #[test]
    fn hashed_concept_ids() {
        let mut h = harness();
        let mut state = h.state([("crop", Value::str("label1"))]);
        assert_eq!(
            pattern_expand("{crop | autoCV('crops', 'hash')}", &mut state).unwrap(),
            Value::Term(Term::iri(format!(
                "{}/def/crops/LQOLIG61J9UEV7BN9JOF36NUSRGICPDM",
                BASE
            )))
        );
    }

    #[test]
    fn repeated_labels_reuse_one_concept() {
        let mut h = harness();
        for _ in 0..2 {
            let mut state = h.state([("crop", Value::str("Barley"))]);
            pattern_expand("{crop | autoCV('crops')}", &mut state).unwrap();
        }
        let concept = Term::iri(format!("{}/def/crops/Barley", BASE));
        let scheme = Term::iri(format!("{}/def/crops_scheme", BASE));
        let statements = h.statements();
        let typed = |id: &Term| {
            statements
                .iter()
                .filter(|s| &s.subject == id && s.predicate == Term::iri(v::RDF_TYPE))
                .count()
        };
        assert_eq!(typed(&concept), 1);
        assert_eq!(typed(&scheme), 1);
    }

    #[test]
    fn scheme_name_defaults_to_current_property() {
        let mut h = harness();
        let mut state = h.state([
            ("crop", Value::str("Oats")),
            (vars::PROP, Value::str("cropType")),
        ]);
        assert_eq!(
            pattern_expand("{crop | autoCV}", &mut state).unwrap(),
            Value::Term(Term::iri(format!("{}/def/cropType/Oats", BASE)))
        );
        assert_eq!(pattern_expand("{empty | autoCV}", &mut state).ok(), None);
    }
}
