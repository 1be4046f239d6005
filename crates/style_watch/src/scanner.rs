//! Subtree expansion: from a list of changed nodes to the style resources
//! at or beneath them.

use crate::classifier::StyleClassifier;
use html::{DOM, NodeId};

/// Every manageable style resource at or beneath each node of `nodes`.
///
/// Order follows `nodes`, then document order within each node's subtree.
/// Text, comment and unknown nodes contribute nothing. The tree is only read.
pub fn expand<C>(dom: &DOM, classifier: &C, nodes: &[NodeId]) -> Vec<NodeId>
where
    C: StyleClassifier + ?Sized,
{
    let mut results = Vec::new();
    for &node in nodes {
        if !dom.is_element(node) {
            continue;
        }
        if classifier.is_manageable(dom, node) {
            results.push(node);
        }
        results.extend(
            classifier
                .query_descendants(dom, node)
                .into_iter()
                .filter(|descendant| classifier.is_manageable(dom, *descendant)),
        );
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::StyleSelector;

    #[test]
    fn nested_chain_is_found_in_document_order() {
        let mut dom = DOM::new();
        let root = dom.create_element("style");
        let mut parent = root;
        let mut expected = vec![root];
        for depth in 0..6 {
            let wrapper = dom.create_element("div");
            dom.append_child(parent, wrapper).unwrap();
            let style = dom.create_element("style");
            dom.append_child(wrapper, style).unwrap();
            if depth % 2 == 0 {
                expected.push(style);
            } else {
                dom.set_attribute(style, "media", "print").unwrap();
            }
            parent = wrapper;
        }
        assert_eq!(expand(&dom, &StyleSelector::default(), &[root]), expected);
    }

    #[test]
    fn non_elements_are_skipped() {
        let mut dom = DOM::new();
        let text = dom.create_text("<style></style>");
        let comment = dom.create_comment("style");
        assert!(expand(&dom, &StyleSelector::default(), &[text, comment]).is_empty());
    }

    #[test]
    fn results_follow_input_order() {
        let mut dom = DOM::new();
        let first = dom.create_element("div");
        let inner = dom.create_element("style");
        dom.append_child(first, inner).unwrap();
        let second = dom.create_element("style");
        let result = expand(&dom, &StyleSelector::default(), &[second, first]);
        assert_eq!(result, vec![second, inner]);
    }

    #[test]
    fn works_with_trait_objects() {
        let mut dom = DOM::new();
        let style = dom.create_element("style");
        let classifier: Box<dyn StyleClassifier> = Box::new(StyleSelector::default());
        assert_eq!(expand(&dom, classifier.as_ref(), &[style]), vec![style]);
    }
}
