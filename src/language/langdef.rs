//! The Language Definition (LD): a read-only, `serde`-deserializable
//! record of every keyword/operator/literal spelling the lexer,
//! parser, and native backend consume.
//!
//! Loading this from the on-disk JSON file is the external loader's
//! job; the core only ever receives a populated `LanguageDefinition`
//! value. [`LanguageDefinition::canonical`] reproduces the reference
//! spelling table so the core is testable standalone.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keywords {
    pub print: String,
    pub log: String,
    pub input: String,
    pub yeet: String,
    pub snag: String,
    pub invoke: String,
    #[serde(rename = "enum")]
    pub enum_kw: String,
    /// Throw keyword ("kaboom" in the canonical LD). `ThrowStmt` and
    /// its `~>kaboom{expr}` construct need an LD-driven spelling like
    /// every other keyword, so it is added here alongside the rest.
    pub kaboom: String,
    pub nil: String,
    #[serde(rename = "true")]
    pub true_kw: String,
    #[serde(rename = "false")]
    pub false_kw: String,
}

/// Spellings for the seven block constructs. `loop`/`when`/`morph` are
/// block-open keywords (they carry an inline `{spec}`); `else`/`try`/
/// `oops`/`end` are bare. `block_suffix` is the text that terminates a
/// block-open token's raw body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blocks {
    #[serde(rename = "loop")]
    pub loop_kw: String,
    pub when: String,
    #[serde(rename = "else")]
    pub else_kw: String,
    pub morph: String,
    #[serde(rename = "try")]
    pub try_kw: String,
    pub oops: String,
    pub end: String,
    pub block_suffix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorSpec {
    /// Source-level spelling the lexer matches against.
    pub symbol: String,
    /// Canonical internal spelling stored on `BinaryOp`/`UnaryOp`.
    pub emit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operators {
    pub add: OperatorSpec,
    pub sub: OperatorSpec,
    pub mul: OperatorSpec,
    pub div: OperatorSpec,
    #[serde(rename = "mod")]
    pub modulo: OperatorSpec,
    pub eq: OperatorSpec,
    pub neq: OperatorSpec,
    pub lt: OperatorSpec,
    pub lte: OperatorSpec,
    pub gt: OperatorSpec,
    pub gte: OperatorSpec,
    pub and: OperatorSpec,
    pub or: OperatorSpec,
    pub not: OperatorSpec,
}

impl Operators {
    /// All operators paired with their role name, in the lexer's
    /// required match order: `lte`/`gte`/`neq` before `lt`/`gt`/`eq`
    /// so the longer lexeme wins.
    pub fn match_order(&self) -> [(&'static str, &OperatorSpec); 14] {
        [
            ("lte", &self.lte),
            ("gte", &self.gte),
            ("neq", &self.neq),
            ("lt", &self.lt),
            ("gt", &self.gt),
            ("eq", &self.eq),
            ("add", &self.add),
            ("sub", &self.sub),
            ("mul", &self.mul),
            ("div", &self.div),
            ("mod", &self.modulo),
            ("and", &self.and),
            ("or", &self.or),
            ("not", &self.not),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub action: String,
    pub range: String,
    pub colon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Syntax {
    pub emit: String,
    pub grab: String,
    pub val: String,
    pub with: String,
    pub cases: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literals {
    pub number_prefix: char,
    pub string_delim: char,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDefinition {
    pub keywords: Keywords,
    pub blocks: Blocks,
    pub operators: Operators,
    pub structure: Structure,
    pub syntax: Syntax,
    pub literals: Literals,
}

impl LanguageDefinition {
    /// The reference spelling table, used by tests and by callers that
    /// have no JSON file handy.
    pub fn canonical() -> Self {
        fn op(symbol: &str, emit: &str) -> OperatorSpec {
            OperatorSpec { symbol: symbol.into(), emit: emit.into() }
        }
        LanguageDefinition {
            keywords: Keywords {
                print: "frob".into(),
                log: "spew".into(),
                input: "input".into(),
                yeet: "yeet".into(),
                snag: "snag".into(),
                invoke: "invoke".into(),
                enum_kw: "enum".into(),
                kaboom: "kaboom".into(),
                nil: "nil".into(),
                true_kw: "true".into(),
                false_kw: "false".into(),
            },
            blocks: Blocks {
                loop_kw: "loop".into(),
                when: "when".into(),
                else_kw: "else".into(),
                morph: "morph".into(),
                try_kw: "try".into(),
                oops: "oops".into(),
                end: String::new(),
                block_suffix: "}>>".into(),
            },
            operators: Operators {
                add: op("<+>", "+"),
                sub: op("<->", "-"),
                mul: op("<*>", "*"),
                div: op("</>", "/"),
                modulo: op("<%>", "%"),
                eq: op("<=>", "=="),
                neq: op("<!=>", "!="),
                lt: op("<lt>", "<"),
                lte: op("<lte>", "<="),
                gt: op("<gt>", ">"),
                gte: op("<gte>", ">="),
                and: op("<&&>", "&&"),
                or: op("<||>", "||"),
                not: op("<!>", "!"),
            },
            structure: Structure {
                action: "::".into(),
                range: "..".into(),
                colon: ":".into(),
            },
            syntax: Syntax {
                emit: "emit".into(),
                grab: "grab".into(),
                val: "val".into(),
                with: "with".into(),
                cases: "cases".into(),
            },
            literals: Literals {
                number_prefix: '#',
                string_delim: '"',
                comment: "@@".into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_round_trips_through_json() {
        let ld = LanguageDefinition::canonical();
        let json = serde_json::to_string(&ld).unwrap();
        let back: LanguageDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(ld, back);
    }

    #[test]
    fn operator_match_order_puts_longer_lexemes_first() {
        let ld = LanguageDefinition::canonical();
        let order = ld.operators.match_order();
        let pos = |name: &str| order.iter().position(|(n, _)| *n == name).unwrap();
        assert!(pos("lte") < pos("lt"));
        assert!(pos("gte") < pos("gt"));
        assert!(pos("neq") < pos("eq"));
    }
}
