/**
 * Services Module
 * One service per backing file: admin identity, blog content, visitor
 * analytics, plus the outbound notification port.
 */

pub mod admin;
pub mod blog;
pub mod notify;
pub mod visitor;
