//! Global is-a rule: facts of a child id are also facts of every ancestor

use crate::rule::{Activation, FactIndex, IsAIndex};

/// One copy per fact and ancestor
pub(crate) fn matches(index: &IsAIndex, facts: &dyn FactIndex) -> Vec<Activation> {
    index
        .children()
        .flat_map(|child| facts.facts_for(child))
        .flat_map(|fact| {
            index.ancestors_of(fact.id()).map(move |ancestor| {
                let copy = fact.copy_as(ancestor);
                Activation { sources: vec![fact.root().clone()], proposition: copy }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::testing::{reading, Facts};
    use kairos_domain::PropositionId;

    #[test]
    fn test_copies_to_every_ancestor_once() {
        let lab = PropositionId::new("LAB");
        let glucose = PropositionId::new("GLUCOSE");
        let lab_children = vec![glucose.clone()];
        let glucose_children = vec![PropositionId::new("GLUCOSE_SERUM")];
        let index = IsAIndex::from_links(vec![
            (&lab, lab_children.as_slice()),
            (&glucose, glucose_children.as_slice()),
        ]);

        let mut facts = Facts::default().with(reading("GLUCOSE_SERUM", "g1", 0, 100.0));
        let first = matches(&index, &facts);
        let ids: Vec<&str> = first.iter().map(|a| a.proposition.id().as_str()).collect();
        assert_eq!(ids, vec!["GLUCOSE", "LAB"]);

        for activation in &first {
            facts.insert(activation.proposition.clone());
        }
        // Copying the GLUCOSE copy to LAB lands on the existing LAB copy
        let second = matches(&index, &facts);
        assert!(second.iter().all(|a| facts.contains(a.proposition.unique_id())));
    }
}
