//! Method scanning: eligibility filters and text normalization.
//!
//! A single recursive-descent traversal over the tree-sitter syntax tree
//! carries an explicit mutable context: the eligibility flag, the flat
//! statement list counters, and the pending text edits from which the raw
//! and normalized method texts are rendered.

use tree_sitter::Node;

use super::whitelist;
use crate::core::{ExtractedMethod, UNASSIGNED_ID};
use crate::parser::ParseTree;

/// Provenance of the translation unit being scanned.
#[derive(Debug, Clone, Copy, Default)]
pub struct Origin<'a> {
    pub path: &'a str,
    pub repository: Option<&'a str>,
    pub revision: Option<&'a str>,
}

/// Statement kinds collected by the flat body traversal.
const STATEMENT_KINDS: [&str; 18] = [
    "expression_statement",
    "local_variable_declaration",
    "if_statement",
    "for_statement",
    "enhanced_for_statement",
    "while_statement",
    "do_statement",
    "switch_expression",
    "return_statement",
    "throw_statement",
    "try_statement",
    "try_with_resources_statement",
    "synchronized_statement",
    "break_statement",
    "continue_statement",
    "assert_statement",
    "yield_statement",
    "labeled_statement",
];

/// The subset of collected statements that introduce control flow.
const BRANCH_KINDS: [&str; 6] = [
    "do_statement",
    "for_statement",
    "enhanced_for_statement",
    "if_statement",
    "switch_expression",
    "while_statement",
];

/// Literal kinds a bare `return` of which carries no interesting logic.
const BARE_OPERAND_KINDS: [&str; 10] = [
    "identifier",
    "null_literal",
    "character_literal",
    "string_literal",
    "decimal_integer_literal",
    "hex_integer_literal",
    "octal_integer_literal",
    "binary_integer_literal",
    "decimal_floating_point_literal",
    "hex_floating_point_literal",
];

const NUMBER_LITERAL_KINDS: [&str; 6] = [
    "decimal_integer_literal",
    "hex_integer_literal",
    "octal_integer_literal",
    "binary_integer_literal",
    "decimal_floating_point_literal",
    "hex_floating_point_literal",
];

/// Extract all eligible methods from a parsed translation unit.
///
/// Trees with syntax problems must be filtered out by the caller; methods
/// nested inside other method bodies (anonymous classes) are not visited.
pub fn extract_methods(tree: &ParseTree, origin: Origin<'_>) -> Vec<ExtractedMethod> {
    let mut methods = Vec::new();
    collect(tree.root_node(), tree, origin, &mut methods);
    methods
}

/// Count every method declaration in the unit, eligible or not.
pub fn count_methods(tree: &ParseTree) -> usize {
    fn walk(node: Node<'_>, count: &mut usize) {
        if node.kind() == "method_declaration" {
            *count += 1;
            return;
        }
        for child in node.children(&mut node.walk()) {
            walk(child, count);
        }
    }
    let mut count = 0;
    walk(tree.root_node(), &mut count);
    count
}

fn collect(
    node: Node<'_>,
    tree: &ParseTree,
    origin: Origin<'_>,
    methods: &mut Vec<ExtractedMethod>,
) {
    match node.kind() {
        // constructors are never candidates
        "constructor_declaration" => {}
        "method_declaration" => {
            if let Some(method) = MethodScan::new(tree).run(node, origin) {
                methods.push(method);
            }
        }
        _ => {
            for child in node.children(&mut node.walk()) {
                collect(child, tree, origin, methods);
            }
        }
    }
}

/// A pending edit to the method's source span.
struct Edit {
    start: usize,
    end: usize,
    /// None deletes the span, Some replaces it.
    replacement: Option<String>,
    /// Raw edits apply to both the raw and the normalized text; the rest
    /// only to the normalized text.
    raw: bool,
}

/// Traversal context for one method declaration.
struct MethodScan<'t> {
    tree: &'t ParseTree,
    eligible: bool,
    statements: u32,
    branches: u32,
    /// Depth of nested type-argument lists; the whitelist check is
    /// suspended inside them.
    type_arg_depth: u32,
    edits: Vec<Edit>,
}

impl<'t> MethodScan<'t> {
    fn new(tree: &'t ParseTree) -> Self {
        Self {
            tree,
            eligible: true,
            statements: 0,
            branches: 0,
            type_arg_depth: 0,
            edits: Vec::new(),
        }
    }

    fn run(mut self, node: Node<'_>, origin: Origin<'_>) -> Option<ExtractedMethod> {
        // a throws clause makes the generated tests dependent on the
        // declared exception types
        if node.children(&mut node.walk()).any(|c| c.kind() == "throws") {
            return None;
        }

        let body = node.child_by_field_name("body")?;
        let return_type = node.child_by_field_name("type")?;
        let name = node.child_by_field_name("name")?;
        let parameters = node.child_by_field_name("parameters")?;

        // strip annotations and modifiers from the method and each
        // parameter before the raw text is rendered
        if let Some(modifiers) = node.children(&mut node.walk()).find(|c| c.kind() == "modifiers")
        {
            self.delete_with_trailing_ws(&modifiers, true);
        }
        for param in parameters.named_children(&mut parameters.walk()) {
            if let Some(modifiers) = param
                .children(&mut param.walk())
                .find(|c| c.kind() == "modifiers")
            {
                self.delete_with_trailing_ws(&modifiers, true);
            }
        }

        self.replace(&name, "$method".to_string());

        self.visit(return_type);
        self.visit(parameters);
        self.visit(body);

        if !self.eligible {
            return None;
        }

        let start = node.start_byte();
        let end = node.end_byte();
        let raw_text = self.render(start, end, false);
        let normalized_text = self.render(start, end, true);

        let mut parameter_types = Vec::new();
        for param in parameters.named_children(&mut parameters.walk()) {
            match param.kind() {
                "formal_parameter" => {
                    if let Some(ty) = param.child_by_field_name("type") {
                        parameter_types.push(self.tree.node_text(&ty).to_string());
                    }
                }
                "spread_parameter" => {
                    if let Some(ty) = param
                        .named_children(&mut param.walk())
                        .find(|c| c.kind() != "modifiers" && c.kind() != "variable_declarator")
                    {
                        parameter_types.push(format!("{}...", self.tree.node_text(&ty)));
                    }
                }
                _ => {}
            }
        }

        Some(ExtractedMethod {
            return_type: self.tree.node_text(&return_type).to_string(),
            name: self.tree.node_text(&name).to_string(),
            raw_text,
            normalized_text,
            statements: self.statements,
            branches: self.branches,
            path: origin.path.to_string(),
            start_line: node.start_position().row as u32 + 1,
            end_line: node.end_position().row as u32 + 1,
            repository: origin.repository.map(str::to_string),
            revision: origin.revision.map(str::to_string),
            parameters: parameter_types,
            id: UNASSIGNED_ID,
        })
    }

    fn visit(&mut self, node: Node<'_>) {
        let kind = node.kind();

        if STATEMENT_KINDS.contains(&kind) {
            self.statements += 1;
            if BRANCH_KINDS.contains(&kind) {
                self.branches += 1;
            }
        }

        match kind {
            "line_comment" | "block_comment" => self.delete(&node, false),

            "identifier" => self.replace(&node, "$variable".to_string()),
            "character_literal" => self.replace(&node, "'$'".to_string()),
            "string_literal" => self.replace(&node, "\"$string\"".to_string()),
            k if NUMBER_LITERAL_KINDS.contains(&k) => self.replace(&node, "0".to_string()),

            "type_identifier" => {
                let text = self.tree.node_text(&node);
                if self.type_arg_depth == 0 && !whitelist::is_permitted(text) {
                    self.eligible = false;
                }
            }
            // package-qualified type references cannot be resolved in a
            // standalone unit
            "scoped_type_identifier" => self.eligible = false,
            "wildcard" => self.eligible = false,

            "type_arguments" => {
                self.delete(&node, false);
                self.type_arg_depth += 1;
                self.visit_children(node);
                self.type_arg_depth -= 1;
            }

            // multi-catch is a union type
            "catch_type" => {
                if node.named_child_count() > 1 {
                    self.eligible = false;
                }
                self.visit_children(node);
            }
            // a cast to more than one type is an intersection type
            "cast_expression" => {
                let type_count = node
                    .children_by_field_name("type", &mut node.walk())
                    .count();
                if type_count > 1 {
                    self.eligible = false;
                }
                self.visit_children(node);
            }

            "method_invocation" => {
                // without an explicit receiver the call would resolve
                // against the enclosing, now-missing, class
                let Some(object) = node.child_by_field_name("object") else {
                    self.eligible = false;
                    return;
                };
                self.visit(object);
                if let Some(type_args) = node.child_by_field_name("type_arguments") {
                    self.visit(type_args);
                }
                if let Some(arguments) = node.child_by_field_name("arguments") {
                    self.visit_children(arguments);
                }
                // the invoked name itself is deliberately not renamed
            }

            "local_variable_declaration" => {
                if let Some(modifiers) = node
                    .children(&mut node.walk())
                    .find(|c| c.kind() == "modifiers")
                {
                    self.delete_with_trailing_ws(&modifiers, false);
                }
                self.visit_children(node);
            }

            "return_statement" => self.visit_return(node),

            "throw_statement" => {
                // any throw rejects the method; see DESIGN.md for the
                // resolution of the sole-statement variant of this filter
                self.eligible = false;
                self.visit_children(node);
            }

            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node<'_>) {
        for child in node.children(&mut node.walk()) {
            self.visit(child);
        }
    }

    fn visit_return(&mut self, node: Node<'_>) {
        let operand = node
            .named_children(&mut node.walk())
            .find(|c| c.kind() != "line_comment" && c.kind() != "block_comment");

        // a value-less return means the method behaves void-like
        let Some(operand) = operand else {
            self.eligible = false;
            return;
        };

        // `return <bare variable or literal>;` as the entire body
        if BARE_OPERAND_KINDS.contains(&operand.kind()) {
            if let Some(block) = node.parent() {
                let sole_statement = block.kind() == "block"
                    && block
                        .named_children(&mut block.walk())
                        .filter(|c| c.kind() != "line_comment" && c.kind() != "block_comment")
                        .count()
                        == 1
                    && block
                        .parent()
                        .is_some_and(|p| p.kind() == "method_declaration");
                if sole_statement {
                    self.eligible = false;
                    return;
                }
            }
        }

        self.visit(operand);
    }

    fn delete(&mut self, node: &Node<'_>, raw: bool) {
        self.edits.push(Edit {
            start: node.start_byte(),
            end: node.end_byte(),
            replacement: None,
            raw,
        });
    }

    /// Delete a span together with the whitespace that follows it, so the
    /// rendered text does not keep the gap the modifiers occupied.
    fn delete_with_trailing_ws(&mut self, node: &Node<'_>, raw: bool) {
        let mut end = node.end_byte();
        let src = &self.tree.source;
        while end < src.len() && src[end].is_ascii_whitespace() {
            end += 1;
        }
        self.edits.push(Edit {
            start: node.start_byte(),
            end,
            replacement: None,
            raw,
        });
    }

    fn replace(&mut self, node: &Node<'_>, replacement: String) {
        self.edits.push(Edit {
            start: node.start_byte(),
            end: node.end_byte(),
            replacement: Some(replacement),
            raw: false,
        });
    }

    /// Render the method span with the applicable edits spliced in.
    /// Edits contained in an already-applied span are skipped.
    fn render(&mut self, start: usize, end: usize, normalized: bool) -> String {
        self.edits
            .sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let src = &self.tree.source;
        let mut out = String::new();
        let mut cursor = start;
        for edit in &self.edits {
            if !normalized && !edit.raw {
                continue;
            }
            if edit.start < cursor {
                continue;
            }
            out.push_str(&String::from_utf8_lossy(&src[cursor..edit.start]));
            if let Some(replacement) = &edit.replacement {
                out.push_str(replacement);
            }
            cursor = edit.end.min(end);
        }
        out.push_str(&String::from_utf8_lossy(&src[cursor..end]));
        out
    }
}
