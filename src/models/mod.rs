//! Data models for CoolLibrary

pub mod author;
pub mod book;
pub mod customer;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use author::{Author, AuthorBook, AuthorQuery, AuthorWithBooks};
pub use book::{Availability, Book, BookSummary, CreateBook};
pub use customer::{CreateCustomer, Customer, CustomerSummary, MembershipStatus};
pub use loan::{Loan, LoanCommit, LoanOutcome, LoanRejection, LoanResponse, LoanStatus, NewLoan};
pub use user::{User, UserClaims};
