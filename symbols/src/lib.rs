use std::collections::HashMap;

use rmc_parser::ast::{self, Identifier, Type};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SemanticError {
    #[error("No main function defined.")]
    NoMainFunction,
    #[error("Too many main functions defined.")]
    TooManyMainFunctions,
    #[error("Main has wrong signature. Must be `int main()`")]
    WrongMainSignature,
    #[error("Multiple definitions of function \"{0}\".")]
    FunctionRedefined(Identifier),
    #[error("Multiple declarations of variable \"{0}\" in function \"{1}\".")]
    VariableRedeclared(Identifier, Identifier),
    #[error("Use of undeclared variable \"{0}\" in function \"{1}\".")]
    UndeclaredVariable(Identifier, Identifier),
    #[error("\"{0}\" is an array and can only be used with an index.")]
    ArrayUsedAsScalar(Identifier),
    #[error("\"{0}\" is not an array but is indexed like one.")]
    NotAnArray(Identifier),
    #[error("Call to unknown function \"{0}\".")]
    UnknownFunction(Identifier),
    #[error("Function \"{name}\" expects {expected} arguments but got {actual}.")]
    WrongArgumentCount {
        name: Identifier,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    /// `None` for `void` functions.
    pub return_type: Option<Type>,
    pub params: Vec<Type>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInfo {
    pub ty: Type,
    /// Element count for arrays, `None` for scalars.
    pub array_size: Option<usize>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SymbolTable {
    functions: HashMap<Identifier, FunctionSignature>,
    variables: HashMap<Identifier, HashMap<Identifier, VarInfo>>,
}

impl SymbolTable {
    /// Collects every function signature and every variable declared
    /// anywhere in a function body.
    ///
    /// Variable names are function-unique. Stack slots are keyed by bare
    /// name later on, so a nested declaration reusing a name would alias
    /// the outer slot. Such programs are rejected here.
    pub fn build(program: &ast::Program) -> Result<Self, SemanticError> {
        let mut table = Self::default();

        for function in &program.functions {
            if table.functions.contains_key(&function.name) {
                if function.name == "main" {
                    return Err(SemanticError::TooManyMainFunctions);
                }
                return Err(SemanticError::FunctionRedefined(function.name.clone()));
            }
            table.functions.insert(
                function.name.clone(),
                FunctionSignature {
                    return_type: function.return_type,
                    params: function.params.iter().map(|param| param.ty).collect(),
                },
            );

            let mut vars = HashMap::new();
            for param in &function.params {
                declare(
                    &mut vars,
                    &function.name,
                    &param.name,
                    VarInfo {
                        ty: param.ty,
                        array_size: None,
                    },
                )?;
            }
            for statement in &function.body {
                collect_statement(&mut vars, &function.name, statement)?;
            }
            table.variables.insert(function.name.clone(), vars);
        }

        Ok(table)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    pub fn variable(&self, function: &str, name: &str) -> Option<&VarInfo> {
        self.variables.get(function).and_then(|vars| vars.get(name))
    }
}

fn declare(
    vars: &mut HashMap<Identifier, VarInfo>,
    function: &str,
    name: &str,
    info: VarInfo,
) -> Result<(), SemanticError> {
    if vars.contains_key(name) {
        return Err(SemanticError::VariableRedeclared(
            name.to_owned(),
            function.to_owned(),
        ));
    }
    vars.insert(name.to_owned(), info);
    Ok(())
}

fn collect_statement(
    vars: &mut HashMap<Identifier, VarInfo>,
    function: &str,
    statement: &ast::Statement,
) -> Result<(), SemanticError> {
    match statement {
        ast::Statement::Declaration(decl) => declare(
            vars,
            function,
            &decl.name,
            VarInfo {
                ty: decl.ty,
                array_size: decl.size,
            },
        ),
        ast::Statement::If { then, r#else, .. } => {
            collect_statement(vars, function, then)?;
            match r#else {
                Some(else_stmt) => collect_statement(vars, function, else_stmt),
                None => Ok(()),
            }
        }
        ast::Statement::While { body, .. } => collect_statement(vars, function, body),
        ast::Statement::Compound(statements) => {
            for statement in statements {
                collect_statement(vars, function, statement)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Validates a program against its symbol table. [`SymbolTable::build`]
/// must have succeeded on the same program beforehand.
pub fn run_checks(program: &ast::Program, table: &SymbolTable) -> Result<(), SemanticError> {
    let main = program
        .functions
        .iter()
        .find(|function| function.name == "main")
        .ok_or(SemanticError::NoMainFunction)?;
    if main.return_type != Some(Type::Int) || !main.params.is_empty() {
        return Err(SemanticError::WrongMainSignature);
    }

    for function in &program.functions {
        for statement in &function.body {
            check_statement(table, &function.name, statement)?;
        }
    }
    Ok(())
}

fn check_statement(
    table: &SymbolTable,
    function: &str,
    statement: &ast::Statement,
) -> Result<(), SemanticError> {
    match statement {
        ast::Statement::Declaration(_) => Ok(()),
        ast::Statement::Assignment(assignment) => {
            let info = table
                .variable(function, &assignment.name)
                .ok_or_else(|| undeclared(&assignment.name, function))?;
            match (&assignment.index, info.array_size) {
                (Some(_), None) => return Err(SemanticError::NotAnArray(assignment.name.clone())),
                (None, Some(_)) => {
                    return Err(SemanticError::ArrayUsedAsScalar(assignment.name.clone()))
                }
                _ => {}
            }
            if let Some(index) = &assignment.index {
                check_expression(table, function, index)?;
            }
            check_expression(table, function, &assignment.value)
        }
        ast::Statement::Expression(expression) => check_expression(table, function, expression),
        ast::Statement::If {
            condition,
            then,
            r#else,
        } => {
            check_expression(table, function, condition)?;
            check_statement(table, function, then)?;
            match r#else {
                Some(else_stmt) => check_statement(table, function, else_stmt),
                None => Ok(()),
            }
        }
        ast::Statement::While { condition, body } => {
            check_expression(table, function, condition)?;
            check_statement(table, function, body)
        }
        ast::Statement::Return(expression) => match expression {
            Some(expression) => check_expression(table, function, expression),
            None => Ok(()),
        },
        ast::Statement::Compound(statements) => {
            for statement in statements {
                check_statement(table, function, statement)?;
            }
            Ok(())
        }
    }
}

fn check_expression(
    table: &SymbolTable,
    function: &str,
    expression: &ast::Expression,
) -> Result<(), SemanticError> {
    match expression {
        ast::Expression::IntConstant(_)
        | ast::Expression::FloatConstant(_)
        | ast::Expression::BoolConstant(_)
        | ast::Expression::StringConstant(_) => Ok(()),
        ast::Expression::Var(name) => {
            let info = table
                .variable(function, name)
                .ok_or_else(|| undeclared(name, function))?;
            if info.array_size.is_some() {
                return Err(SemanticError::ArrayUsedAsScalar(name.clone()));
            }
            Ok(())
        }
        ast::Expression::ArrayElement { name, index } => {
            let info = table
                .variable(function, name)
                .ok_or_else(|| undeclared(name, function))?;
            if info.array_size.is_none() {
                return Err(SemanticError::NotAnArray(name.clone()));
            }
            check_expression(table, function, index)
        }
        ast::Expression::Unary { expression, .. } => check_expression(table, function, expression),
        ast::Expression::Binary { lhs, rhs, .. } => {
            check_expression(table, function, lhs)?;
            check_expression(table, function, rhs)
        }
        ast::Expression::FunctionCall(name, arguments) => {
            let signature = table
                .function(name)
                .ok_or_else(|| SemanticError::UnknownFunction(name.clone()))?;
            if signature.params.len() != arguments.len() {
                return Err(SemanticError::WrongArgumentCount {
                    name: name.clone(),
                    expected: signature.params.len(),
                    actual: arguments.len(),
                });
            }
            for argument in arguments {
                check_expression(table, function, argument)?;
            }
            Ok(())
        }
    }
}

fn undeclared(name: &str, function: &str) -> SemanticError {
    SemanticError::UndeclaredVariable(name.to_owned(), function.to_owned())
}
