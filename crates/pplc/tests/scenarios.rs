//! End-to-end compilation scenarios.

use pplc::{compile, CompileError, CompileOptions, Language};
use pretty_assertions::assert_eq;

const LINEAR_REGRESSION: &str = "\
slope = sample(normal(0.0, 10.0))
bias = sample(normal(0.0, 10.0))
data = [[1.0, 2.1], [2.0, 3.9], [3.0, 5.3]]
zn = slope * data[:, 0] + bias
observe(normal(zn, ones(len(zn))), data[:, 1])
[slope, bias]
";

#[test]
fn linear_regression_graph_shape() {
    let graph = compile(LINEAR_REGRESSION, &CompileOptions::default()).unwrap();

    assert_eq!(graph.vertex_names(), vec!["slope", "bias", "y1", "y2", "y3"]);
    for name in ["slope", "bias"] {
        let v = graph.vertex(name).unwrap();
        assert!(v.is_sampled() && v.is_continuous());
        assert!(v.parents.is_empty());
    }
    for name in ["y1", "y2", "y3"] {
        let v = graph.vertex(name).unwrap();
        assert!(v.is_observed() && v.is_continuous());
        assert_eq!(
            v.parents.iter().collect::<Vec<_>>(),
            vec!["bias", "slope"],
            "each observation depends on exactly the two latents"
        );
    }
    // a bipartite arc structure: two latents times three observations
    assert_eq!(graph.arcs.len(), 6);
    // the data matrix was folded away entirely
    assert!(graph.data.is_empty());
    assert_eq!(graph.conditionals.len(), 0);
    assert_eq!(graph.result.as_deref(), Some("[slope, bias]"));

    let y1 = graph.vertex("y1").unwrap();
    assert_eq!(y1.distribution, "normal(slope + bias, 1.0)");
    assert_eq!(y1.observation.as_deref(), Some("2.1"));
    let y2 = graph.vertex("y2").unwrap();
    assert_eq!(y2.distribution, "normal(slope * 2.0 + bias, 1.0)");
}

const MIXTURE: &str = "\
; gaussian mixture, two components, ten points
(def ys [-2.0 -2.5 -1.7 -1.9 -2.2 1.5 2.2 3.0 1.2 2.8])
(def pi [0.5 0.5])
(def mus (sample (normal (zeros 2) (* 2 (ones 2)))))
(def zn (sample (categorical pi) 10))
(defn point [i _ mus zn ys]
  (observe (normal (nth mus (nth zn i)) 1.0) (nth ys i)))
(loop 10 nil point mus zn ys)
mus
";

#[test]
fn mixture_model_graph_shape() {
    let graph = compile(MIXTURE, &CompileOptions::default()).unwrap();

    let mu_names: Vec<_> = graph
        .vertex_names()
        .into_iter()
        .filter(|n| n.starts_with("mus"))
        .collect();
    assert_eq!(mu_names, vec!["mus_0", "mus_1"]);
    for name in &mu_names {
        let v = graph.vertex(name).unwrap();
        assert!(v.is_sampled() && v.is_continuous());
    }

    let z_names: Vec<_> = graph
        .vertex_names()
        .into_iter()
        .filter(|n| n.starts_with("zn"))
        .collect();
    assert_eq!(z_names.len(), 10);
    for name in &z_names {
        let v = graph.vertex(name).unwrap();
        assert!(v.is_sampled() && v.is_discrete());
        assert_eq!(v.distribution, "categorical(pi)");
        assert_eq!(v.parents.iter().collect::<Vec<_>>(), vec!["pi"]);
    }

    let observations: Vec<_> = graph.vertices.iter().filter(|v| v.is_observed()).collect();
    assert_eq!(observations.len(), 10);
    for (i, v) in observations.iter().enumerate() {
        let mut expected = vec![
            "mus_0".to_owned(),
            "mus_1".to_owned(),
            format!("zn_{i}"),
        ];
        expected.sort();
        let parents: Vec<_> = v.parents.iter().cloned().collect();
        assert_eq!(parents, expected);
    }

    // the mixture weights survive as a data node; ys was folded away
    assert_eq!(graph.data.len(), 1);
    assert_eq!(graph.data[0].name, "pi");
    assert_eq!(graph.result.as_deref(), Some("[mus_0, mus_1]"));
}

const IF_MODEL: &str = "\
x = sample(normal(0.0, 1.0))
if x > 0:
    y = sample(normal(1.0, 1.0))
else:
    y = sample(normal(-1.0, 1.0))
observe(normal(y, 1.0), 0.5)
";

#[test]
fn if_model_lifts_one_condition() {
    let graph = compile(IF_MODEL, &CompileOptions::default()).unwrap();

    assert_eq!(graph.conditionals.len(), 1);
    let cond = &graph.conditionals[0];
    assert_eq!(cond.bit_index, 0);
    assert_eq!(cond.expression, "x > 0");
    assert_eq!(cond.parents.iter().collect::<Vec<_>>(), vec!["x"]);

    let y_then = graph.vertex("y").unwrap();
    let y_else = graph.vertex("y_1").unwrap();
    assert!(y_then.is_conditional() && y_else.is_conditional());
    assert_eq!(y_then.condition.as_deref(), Some("cond_0"));
    assert_eq!(y_else.condition.as_deref(), Some("not cond_0"));
    assert_eq!(y_then.distribution, "normal(1.0, 1.0)");
    assert_eq!(y_else.distribution, "normal(-1.0, 1.0)");

    let observed = graph
        .vertices
        .iter()
        .find(|v| v.is_observed())
        .expect("observation vertex");
    assert_eq!(
        observed.parents.iter().collect::<Vec<_>>(),
        vec!["cond_0", "y", "y_1"]
    );
    assert_eq!(
        observed.distribution,
        "normal(y if cond_0 else y_1, 1.0)"
    );
}

#[test]
fn asymmetric_branch_assignment_is_rejected() {
    let source = "\
x = sample(normal(0.0, 1.0))
if x > 0:
    y = sample(normal(1.0, 1.0))
observe(normal(y, 1.0), 0.5)
";
    let err = compile(source, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::Graph { .. }));
}

#[test]
fn bounded_loop_unrolls_before_graph_construction() {
    let source = "\
; three accumulation steps, fully static
(def init 1.0)
(defn step [i acc a b] (+ acc (* a b)))
(loop 3 init step 2.0 3.0)
";
    let graph = compile(source, &CompileOptions::default()).unwrap();
    assert!(graph.vertices.is_empty());
    assert_eq!(graph.result.as_deref(), Some("19.0"));
}

#[test]
fn loop_count_can_come_from_a_binding() {
    let source = "\
(def n 2)
(defn grow [i acc] (+ acc acc))
(loop n 1.0 grow)
";
    let graph = compile(source, &CompileOptions::default()).unwrap();
    assert_eq!(graph.result.as_deref(), Some("4.0"));
}

#[test]
fn namespace_remap_matches_direct_spelling() {
    let remapped = compile(
        "z = sample(select([0.3, 0.7]))\nz\n",
        &CompileOptions::default().with_namespace_entry("select", "categorical"),
    )
    .unwrap();
    let direct = compile(
        "z = sample(categorical([0.3, 0.7]))\nz\n",
        &CompileOptions::default(),
    )
    .unwrap();
    assert_eq!(remapped, direct);

    let z = remapped.vertex("z").unwrap();
    assert!(z.is_discrete() && z.is_sampled());
    assert_eq!(z.distribution, "categorical([0.3, 0.7])");
}

#[test]
fn inliner_hygiene_leaves_no_trace_after_simplification() {
    let source = "\
def f(x):
    return x + 1
a = sample(normal(0.0, 1.0))
observe(normal(f(a), 1.0), 2.0)
observe(normal(f(a), 1.0), 3.0)
";
    let graph = compile(source, &CompileOptions::default()).unwrap();
    let observed: Vec<_> = graph.vertices.iter().filter(|v| v.is_observed()).collect();
    assert_eq!(observed.len(), 2);
    for v in observed {
        assert_eq!(v.distribution, "normal(a + 1, 1.0)");
        assert_eq!(v.parents.iter().collect::<Vec<_>>(), vec!["a"]);
    }
}

#[test]
fn compilation_is_deterministic() {
    let first = compile(MIXTURE, &CompileOptions::default()).unwrap();
    let second = compile(MIXTURE, &CompileOptions::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn both_front_ends_produce_the_same_graph() {
    let python = compile(
        "x = sample(normal(0.0, 1.0))\nobserve(normal(x, 1.0), 0.5)\nx\n",
        &CompileOptions::default().with_language(Language::Python),
    )
    .unwrap();
    let lisp = compile(
        "(def x (sample (normal 0.0 1.0))) (observe (normal x 1.0) 0.5) x",
        &CompileOptions::default().with_language(Language::Clojure),
    )
    .unwrap();
    assert_eq!(python, lisp);
}

#[test]
fn vectorised_sample_size_requires_a_literal() {
    let source = "(def zn (sample (categorical [0.5 0.5]) m))";
    let err = compile(source, &CompileOptions::default()).unwrap_err();
    assert!(
        matches!(err, CompileError::Static { .. } | CompileError::Resolution { .. }),
        "got {err:?}"
    );
}

#[test]
fn unresolved_names_are_reported() {
    let err = compile(
        "x = sample(normal(mystery, 1.0))\n",
        &CompileOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err, CompileError::resolution("mystery"));
}

#[test]
fn sampling_from_a_non_distribution_is_a_graph_error() {
    let err = compile("x = sample(1.0)\n", &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::Graph { .. }));
}

#[test]
fn observed_graphs_validate_their_invariants() {
    let graph = compile(LINEAR_REGRESSION, &CompileOptions::default()).unwrap();
    // vertex/data/condition names are pairwise disjoint and re-validated on
    // construction; spot-check the arc/parent agreement here
    for vertex in &graph.vertices {
        for parent in &vertex.parents {
            assert!(graph
                .arcs
                .contains(&(parent.clone(), vertex.name.clone())));
        }
    }
}
