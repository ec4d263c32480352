pub mod a025_return_request;
pub mod a026_return_workflow;
pub mod a027_order;
pub mod a028_stock_location;
