//! End-to-end scenarios S1-S6: each registers a small converter tree, runs
//! it against a fixed token list, and checks the resulting call.

use std::cell::RefCell;
use std::rc::Rc;

use appeal::convert::{ConverterNode, ConverterRef, NodeBuilder};
use appeal::multi_option::Counter;
use appeal::primitive::Primitive;
use appeal::value::Value;
use appeal::{interpret, Args, Outcome};

fn run(node: Rc<ConverterNode>, argv: &[&str]) -> Outcome {
    let program = appeal::charm::compile(node).unwrap();
    interpret(&program, Args::from_strs(argv)).unwrap()
}

#[test]
fn s1_hello_name() {
    let seen = Rc::new(RefCell::new(None));
    let captured = seen.clone();
    let node = NodeBuilder::new("hello")
        .positional("name", ConverterRef::Primitive(Primitive::Str))
        .unwrap()
        .build_command(move |pos, _| {
            *captured.borrow_mut() = Some(pos[0].clone());
            Ok(0)
        });
    assert_eq!(run(node, &["world"]), Outcome::Exit(0));
    assert_eq!(seen.borrow().as_ref(), Some(&Value::Str("world".into())));
}

#[test]
fn s2_fgrep_with_default_filename() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let captured = seen.clone();
    let node = NodeBuilder::new("fgrep")
        .positional("pattern", ConverterRef::Primitive(Primitive::Str))
        .unwrap()
        .positional_with_default(
            "filename",
            ConverterRef::Primitive(Primitive::Str),
            Value::Str(String::new()),
        )
        .unwrap()
        .build_command(move |pos, _| {
            *captured.borrow_mut() = pos.to_vec();
            Ok(0)
        });
    assert_eq!(run(node, &["WM_CREATE"]), Outcome::Exit(0));
    assert_eq!(
        *seen.borrow(),
        vec![Value::Str("WM_CREATE".into()), Value::Str(String::new())]
    );
}

#[test]
fn s3_fgrep_full_signature() {
    let seen = Rc::new(RefCell::new(None));
    let captured = seen.clone();
    let node = NodeBuilder::new("fgrep")
        .positional("pattern", ConverterRef::Primitive(Primitive::Str))
        .unwrap()
        .var_positional("filenames", ConverterRef::Primitive(Primitive::Str))
        .unwrap()
        .option(
            "color",
            &["--color"],
            ConverterRef::Primitive(Primitive::Str),
            Some(Value::Str(String::new())),
        )
        .unwrap()
        .option(
            "number",
            &["--number"],
            ConverterRef::Primitive(Primitive::Int),
            Some(Value::Int(0)),
        )
        .unwrap()
        .option(
            "ignore_case",
            &["-i", "--ignore-case"],
            ConverterRef::BooleanToggle(false),
            Some(Value::Bool(false)),
        )
        .unwrap()
        .build_command(move |pos, kw| {
            *captured.borrow_mut() = Some((pos.to_vec(), kw.clone()));
            Ok(0)
        });
    let outcome = run(
        node,
        &["-i", "--number", "3", "--color", "blue", "WM_CREATE", "window.c"],
    );
    assert_eq!(outcome, Outcome::Exit(0));
    let (pos, kw) = seen.borrow().clone().unwrap();
    assert_eq!(
        pos,
        vec![Value::Str("WM_CREATE".into()), Value::Str("window.c".into())]
    );
    assert_eq!(kw.get("color"), Some(&Value::Str("blue".into())));
    assert_eq!(kw.get("number"), Some(&Value::Int(3)));
    assert_eq!(kw.get("ignore_case"), Some(&Value::Bool(true)));
}

#[test]
fn s4_recursive_converter() {
    let int_float = NodeBuilder::new("int_float")
        .positional("i", ConverterRef::Primitive(Primitive::Int))
        .unwrap()
        .positional("f", ConverterRef::Primitive(Primitive::Float))
        .unwrap()
        .build_converter(|pos, _| Ok(Value::Seq(pos.to_vec())));

    let my_converter = NodeBuilder::new("my_converter")
        .positional("i_f", ConverterRef::Node(int_float))
        .unwrap()
        .positional("s", ConverterRef::Primitive(Primitive::Str))
        .unwrap()
        .option(
            "verbose",
            &["-v", "--verbose"],
            ConverterRef::BooleanToggle(false),
            Some(Value::Bool(false)),
        )
        .unwrap()
        .build_converter(|pos, kw| {
            Ok(Value::Seq(vec![
                pos[0].clone(),
                pos[1].clone(),
                kw.get("verbose").cloned().unwrap_or(Value::Bool(false)),
            ]))
        });

    let seen = Rc::new(RefCell::new(None));
    let captured = seen.clone();
    let root = NodeBuilder::new("recurse2")
        .positional("a", ConverterRef::Primitive(Primitive::Str))
        .unwrap()
        .positional(
            "b",
            ConverterRef::Node(my_converter),
        )
        .unwrap()
        .build_command(move |pos, _| {
            *captured.borrow_mut() = Some(pos.to_vec());
            Ok(0)
        });

    let outcome = run(root, &["pdq", "1", "2", "xyz", "-v"]);
    assert_eq!(outcome, Outcome::Exit(0));
    let pos = seen.borrow().clone().unwrap();
    assert_eq!(pos[0], Value::Str("pdq".into()));
    let Value::Seq(b) = &pos[1] else { panic!("expected seq") };
    let Value::Seq(i_f) = &b[0] else { panic!("expected seq") };
    assert_eq!(i_f[0], Value::Int(1));
    assert_eq!(i_f[1], Value::Float(2.0));
    assert_eq!(b[1], Value::Str("xyz".into()));
    assert_eq!(b[2], Value::Bool(true));
}

#[test]
fn s5_counter_multi_option() {
    let seen = Rc::new(RefCell::new(None));
    let captured = seen.clone();
    let node = NodeBuilder::new("fgrep")
        .option(
            "verbose",
            &["-v", "--verbose"],
            ConverterRef::MultiOption(Rc::new(Counter)),
            Some(Value::Int(0)),
        )
        .unwrap()
        .build_command(move |_, kw| {
            *captured.borrow_mut() = kw.get("verbose").cloned();
            Ok(0)
        });
    assert_eq!(run(node.clone(), &["-v", "--verbose", "-v"]), Outcome::Exit(0));
    assert_eq!(*seen.borrow(), Some(Value::Int(3)));

    let seen2 = Rc::new(RefCell::new(None));
    let captured2 = seen2.clone();
    let node2 = NodeBuilder::new("fgrep")
        .option(
            "verbose",
            &["-v", "--verbose"],
            ConverterRef::MultiOption(Rc::new(Counter)),
            Some(Value::Int(0)),
        )
        .unwrap()
        .build_command(move |_, kw| {
            *captured2.borrow_mut() = kw.get("verbose").cloned();
            Ok(0)
        });
    assert_eq!(run(node2, &[]), Outcome::Exit(0));
    assert_eq!(*seen2.borrow(), Some(Value::Int(0)));
}

#[test]
fn s6_scope_violation_names_both_option_and_parent() {
    let inner = NodeBuilder::new("my_converter")
        .option(
            "verbose",
            &["-v", "--verbose"],
            ConverterRef::BooleanToggle(false),
            Some(Value::Bool(false)),
        )
        .unwrap()
        .build_converter(|_, kw| Ok(kw.get("verbose").cloned().unwrap_or(Value::Bool(false))));

    let node = NodeBuilder::new("inception")
        .option(
            "option",
            &["--option"],
            ConverterRef::Node(inner),
            Some(Value::Bool(false)),
        )
        .unwrap()
        .build_command(|_, _| Ok(0));

    let program = appeal::charm::compile(node).unwrap();
    let err = interpret(&program, Args::from_strs(&["-v", "--option", "3"])).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("-v"));
    assert!(msg.contains("--option"));
}
